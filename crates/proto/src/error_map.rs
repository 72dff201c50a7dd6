use wiscdb_core::Error;

/// Maps an internal `Error` onto a MySQL error code and SQLSTATE (spec
/// §4.7's mandatory table). Variants the table doesn't name fall back to
/// `1105`/`HY000` ("unknown error"), the same catch-all real MySQL servers
/// use for internal errors that predate a dedicated code.
pub fn mysql_error_code(error: &Error) -> (u16, &'static str) {
	match error {
		Error::UnknownDatabase { .. } => (1049, "42000"),
		Error::UnknownTable { .. } => (1146, "42S02"),
		Error::TableExists { .. } => (1050, "42S01"),
		Error::DatabaseExists { .. } => (1007, "HY000"),
		Error::DuplicateKey { .. } => (1062, "23000"),
		Error::AccessDenied { .. } => (1045, "28000"),
		Error::SyntaxError { .. } => (1064, "42000"),
		Error::LockWaitTimeout => (1205, "HY000"),
		Error::TransactionConflict => (1213, "40001"),
		Error::NotNull { .. } => (1048, "23000"),
		Error::CheckFailed { .. } => (3819, "HY000"),
		Error::TypeMismatch(_) => (1366, "HY000"),
		Error::TableDropped { .. } => (1146, "42S02"),
		Error::RowNotFound => (1032, "HY000"),
		Error::NestedTransactionsNotSupported => (1568, "25001"),
		// MySQL itself doesn't abort a whole session transaction after a
		// single statement error the way this spec requires; there's no
		// native error code for it, so this borrows the XA-rollback-only
		// code as the closest existing "transaction must be rolled back"
		// signal (spec §7 "errors inside an explicit transaction mark it
		// error-only").
		Error::TransactionAborted { .. } => (1613, "HY000"),
		Error::QueryCancelled => (1317, "70100"),
		Error::Storage { .. } => (1030, "HY000"),
		Error::Internal(_) => (1105, "HY000"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mandatory_mappings_match_the_table() {
		assert_eq!(mysql_error_code(&Error::UnknownDatabase { name: "x".to_string() }), (1049, "42000"));
		assert_eq!(mysql_error_code(&Error::DuplicateKey { key_description: "1".to_string() }), (1062, "23000"));
		assert_eq!(mysql_error_code(&Error::TransactionConflict), (1213, "40001"));
		assert_eq!(mysql_error_code(&Error::NotNull { column: "c".to_string() }), (1048, "23000"));
	}
}

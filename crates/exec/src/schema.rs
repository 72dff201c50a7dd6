use wiscdb_type::DataType;

/// The output shape of a query result: one field per projected column, in
/// the order rows will carry values. `wiscdb-proto` turns each into a
/// column-definition packet (spec §4.7).
#[derive(Debug, Clone)]
pub struct OutputSchema {
	pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Field {
	pub name: String,
	pub data_type: DataType,
	pub nullable: bool,
}

impl OutputSchema {
	pub fn empty() -> Self {
		OutputSchema { fields: Vec::new() }
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.fields.iter().position(|f| f.name.eq_ignore_ascii_case(name))
	}
}

//! Connection registry: category → connection name → launch command.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result, StructureIssue};

/// Categories that are never offered for removal when they become empty.
pub const DEFAULT_CATEGORIES: [&str; 2] = ["Lab", "Tools"];

/// A stored launch command.
///
/// The connection's name is its key in the owning category. Fields other
/// than `cmd` found on disk are carried in `extra` so that a load/save cycle
/// does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
	#[serde(rename = "cmd")]
	pub command: String,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl Connection {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			extra: Map::new(),
		}
	}
}

/// Target values for [`Registry::update_connection`].
#[derive(Debug, Clone)]
pub struct ConnectionUpdate {
	pub category: String,
	pub name: String,
	pub command: String,
}

/// Result of removing a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
	pub connection: Connection,
	/// The category is now empty and is not one of [`DEFAULT_CATEGORIES`].
	pub offer_category_removal: bool,
}

/// Validated mapping of categories to their connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
	categories: BTreeMap<String, BTreeMap<String, Connection>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a registry from a parsed document, rejecting anything that
	/// breaks the registry invariants.
	pub fn from_value(value: Value) -> std::result::Result<Self, StructureIssue> {
		let Value::Object(top) = value else {
			return Err(StructureIssue::TopLevelNotMapping);
		};

		let mut registry = Registry::new();
		for (category, connections) in top {
			if category.trim().is_empty() {
				return Err(StructureIssue::EmptyCategoryName);
			}
			let Value::Object(connections) = connections else {
				return Err(StructureIssue::CategoryNotMapping { category });
			};

			let mut entries = BTreeMap::new();
			for (name, settings) in connections {
				if name.trim().is_empty() {
					return Err(StructureIssue::EmptyConnectionName { category });
				}
				let Value::Object(mut settings) = settings else {
					return Err(StructureIssue::ConnectionNotMapping {
						category,
						connection: name,
					});
				};
				let command = match settings.remove("cmd") {
					Some(Value::String(command)) => command,
					_ => {
						return Err(StructureIssue::MissingCommand {
							category,
							connection: name,
						});
					}
				};
				if command.trim().is_empty() {
					return Err(StructureIssue::EmptyCommand {
						category,
						connection: name,
					});
				}
				entries.insert(name, Connection { command, extra: settings });
			}
			registry.categories.insert(category, entries);
		}
		Ok(registry)
	}

	pub fn is_empty(&self) -> bool {
		self.categories.is_empty()
	}

	/// Number of connections across all categories.
	pub fn len(&self) -> usize {
		self.categories.values().map(BTreeMap::len).sum()
	}

	pub fn categories(&self) -> impl Iterator<Item = &str> {
		self.categories.keys().map(String::as_str)
	}

	pub fn contains_category(&self, category: &str) -> bool {
		self.categories.contains_key(category)
	}

	pub fn category(&self, category: &str) -> Option<&BTreeMap<String, Connection>> {
		self.categories.get(category)
	}

	pub fn get(&self, category: &str, name: &str) -> Option<&Connection> {
		self.categories.get(category)?.get(name)
	}

	/// Iterates `(category, name, connection)` in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Connection)> {
		self.categories.iter().flat_map(|(category, connections)| {
			connections
				.iter()
				.map(move |(name, connection)| (category.as_str(), name.as_str(), connection))
		})
	}

	pub fn add_category(&mut self, category: &str) -> Result<()> {
		let category = non_empty(category, "category name")?;
		if self.categories.contains_key(category) {
			return Err(Error::CategoryExists(category.to_string()));
		}
		self.categories.insert(category.to_string(), BTreeMap::new());
		Ok(())
	}

	/// Removes a category together with its connections.
	pub fn remove_category(&mut self, category: &str) -> Result<BTreeMap<String, Connection>> {
		self.categories
			.remove(category)
			.ok_or_else(|| Error::CategoryNotFound(category.to_string()))
	}

	/// Inserts a connection, creating its category when missing.
	///
	/// Returns the replaced connection when `overwrite` allowed replacing one.
	pub fn insert_connection(
		&mut self,
		category: &str,
		name: &str,
		command: &str,
		overwrite: bool,
	) -> Result<Option<Connection>> {
		let category = non_empty(category, "category name")?;
		let name = non_empty(name, "connection name")?;
		let command = non_empty(command, "command")?;

		if !overwrite && self.get(category, name).is_some() {
			return Err(Error::ConnectionExists {
				category: category.to_string(),
				name: name.to_string(),
			});
		}

		Ok(self
			.categories
			.entry(category.to_string())
			.or_default()
			.insert(name.to_string(), Connection::new(command)))
	}

	/// Renames, moves or re-commands a connection.
	///
	/// The old key is removed and the new one inserted; on any error the
	/// registry is left as it was.
	pub fn update_connection(&mut self, category: &str, name: &str, update: ConnectionUpdate) -> Result<()> {
		let new_category = non_empty(&update.category, "category name")?;
		let new_name = non_empty(&update.name, "connection name")?;
		let new_command = non_empty(&update.command, "command")?;

		let Some(existing) = self.get(category, name) else {
			return Err(not_found(category, name));
		};
		let mut connection = existing.clone();

		let same_key = new_category == category && new_name == name;
		if !same_key && self.get(new_category, new_name).is_some() {
			return Err(Error::ConnectionExists {
				category: new_category.to_string(),
				name: new_name.to_string(),
			});
		}

		if let Some(connections) = self.categories.get_mut(category) {
			connections.remove(name);
		}
		connection.command = new_command.to_string();
		self.categories
			.entry(new_category.to_string())
			.or_default()
			.insert(new_name.to_string(), connection);
		Ok(())
	}

	pub fn remove_connection(&mut self, category: &str, name: &str) -> Result<Removal> {
		let connections = self.categories.get_mut(category).ok_or_else(|| not_found(category, name))?;
		let connection = connections.remove(name).ok_or_else(|| not_found(category, name))?;

		let offer_category_removal = connections.is_empty() && !DEFAULT_CATEGORIES.contains(&category);
		Ok(Removal {
			connection,
			offer_category_removal,
		})
	}

	/// Connection names in `category` containing `query`, ignoring case.
	pub fn filter(&self, category: &str, query: &str) -> Vec<&str> {
		let needle = query.to_lowercase();
		self.categories
			.get(category)
			.into_iter()
			.flat_map(BTreeMap::keys)
			.filter(|name| needle.is_empty() || name.to_lowercase().contains(&needle))
			.map(String::as_str)
			.collect()
	}
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(Error::EmptyField(field));
	}
	Ok(trimmed)
}

fn not_found(category: &str, name: &str) -> Error {
	Error::ConnectionNotFound {
		category: category.to_string(),
		name: name.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn sample() -> Registry {
		let mut registry = Registry::new();
		registry.insert_connection("Lab", "db1", "ssh user@db1.internal", false).unwrap();
		registry.insert_connection("Tools", "mon", "ssh user@mon", false).unwrap();
		registry
	}

	#[test]
	fn from_value_accepts_valid_document() {
		let registry = Registry::from_value(json!({ "A": { "x": { "cmd": "echo hi" } } })).unwrap();
		assert_eq!(registry.get("A", "x").unwrap().command, "echo hi");
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn from_value_rejects_non_mapping_category() {
		let issue = Registry::from_value(json!({ "A": "not-a-mapping" })).unwrap_err();
		assert_eq!(issue, StructureIssue::CategoryNotMapping { category: "A".into() });
	}

	#[test]
	fn from_value_rejects_missing_or_non_string_cmd() {
		let issue = Registry::from_value(json!({ "A": { "x": { "command": "echo" } } })).unwrap_err();
		assert_eq!(
			issue,
			StructureIssue::MissingCommand {
				category: "A".into(),
				connection: "x".into()
			}
		);

		let issue = Registry::from_value(json!({ "A": { "x": { "cmd": 5 } } })).unwrap_err();
		assert!(matches!(issue, StructureIssue::MissingCommand { .. }));
	}

	#[test]
	fn from_value_rejects_top_level_array() {
		assert_eq!(Registry::from_value(json!([1, 2])).unwrap_err(), StructureIssue::TopLevelNotMapping);
	}

	#[test]
	fn from_value_keeps_extra_fields() {
		let registry = Registry::from_value(json!({ "A": { "x": { "cmd": "echo", "note": "keep" } } })).unwrap();
		let value = serde_json::to_value(&registry).unwrap();
		assert_eq!(value, json!({ "A": { "x": { "cmd": "echo", "note": "keep" } } }));
	}

	#[test]
	fn insert_refuses_duplicate_without_overwrite() {
		let mut registry = sample();
		let err = registry.insert_connection("Lab", "db1", "ssh other", false).unwrap_err();
		assert!(matches!(err, Error::ConnectionExists { .. }));
		assert_eq!(registry.get("Lab", "db1").unwrap().command, "ssh user@db1.internal");

		let replaced = registry.insert_connection("Lab", "db1", "ssh other", true).unwrap();
		assert_eq!(replaced.unwrap().command, "ssh user@db1.internal");
		assert_eq!(registry.get("Lab", "db1").unwrap().command, "ssh other");
	}

	#[test]
	fn insert_rejects_blank_fields() {
		let mut registry = Registry::new();
		assert!(matches!(
			registry.insert_connection("Lab", " ", "ssh", false),
			Err(Error::EmptyField("connection name"))
		));
		assert!(matches!(
			registry.insert_connection("Lab", "db1", "", false),
			Err(Error::EmptyField("command"))
		));
		assert!(registry.is_empty());
	}

	#[test]
	fn update_moves_connection_between_categories() {
		let mut registry = sample();
		registry
			.update_connection(
				"Lab",
				"db1",
				ConnectionUpdate {
					category: "Prod".into(),
					name: "db-primary".into(),
					command: "ssh admin@db1".into(),
				},
			)
			.unwrap();

		assert!(registry.get("Lab", "db1").is_none());
		assert_eq!(registry.get("Prod", "db-primary").unwrap().command, "ssh admin@db1");
		assert!(registry.contains_category("Lab"));
	}

	#[test]
	fn update_refuses_to_clobber_other_connection() {
		let mut registry = sample();
		let before = registry.clone();
		let err = registry
			.update_connection(
				"Lab",
				"db1",
				ConnectionUpdate {
					category: "Tools".into(),
					name: "mon".into(),
					command: "ssh x".into(),
				},
			)
			.unwrap_err();
		assert!(matches!(err, Error::ConnectionExists { .. }));
		assert_eq!(registry, before);
	}

	#[test]
	fn update_in_place_changes_command() {
		let mut registry = sample();
		registry
			.update_connection(
				"Lab",
				"db1",
				ConnectionUpdate {
					category: "Lab".into(),
					name: "db1".into(),
					command: "ssh -p 2222 user@db1".into(),
				},
			)
			.unwrap();
		assert_eq!(registry.get("Lab", "db1").unwrap().command, "ssh -p 2222 user@db1");
	}

	#[test]
	fn removing_last_connection_offers_category_removal_except_defaults() {
		let mut registry = sample();
		registry.insert_connection("Scratch", "tmp", "ssh tmp", false).unwrap();

		let removal = registry.remove_connection("Scratch", "tmp").unwrap();
		assert!(removal.offer_category_removal);

		let removal = registry.remove_connection("Lab", "db1").unwrap();
		assert!(!removal.offer_category_removal);
	}

	#[test]
	fn remove_missing_connection_is_config_error() {
		let mut registry = sample();
		assert!(matches!(
			registry.remove_connection("Nope", "x"),
			Err(Error::ConnectionNotFound { .. })
		));
	}

	#[test]
	fn add_category_rejects_duplicates() {
		let mut registry = sample();
		assert!(matches!(registry.add_category("Lab"), Err(Error::CategoryExists(_))));
		registry.add_category("Staging").unwrap();
		assert!(registry.category("Staging").unwrap().is_empty());
	}

	#[test]
	fn filter_is_case_insensitive() {
		let mut registry = sample();
		registry.insert_connection("Lab", "DB2-replica", "ssh db2", false).unwrap();
		registry.insert_connection("Lab", "web", "ssh web", false).unwrap();

		assert_eq!(registry.filter("Lab", "db"), vec!["DB2-replica", "db1"]);
		assert_eq!(registry.filter("Lab", "").len(), 3);
		assert!(registry.filter("Missing", "db").is_empty());
	}
}

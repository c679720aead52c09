use super::*;

fn connection() -> ConnectionData {
	ConnectionData {
		category: "Lab".into(),
		name: "db1".into(),
		command: "ssh user@db1.internal".into(),
	}
}

#[test]
fn result_builder_success() {
	let result: CommandResult<ConnectionData> = ResultBuilder::new("show").data(connection()).build();

	assert!(result.ok);
	assert_eq!(result.command, "show");
	assert!(result.data.is_some());
	assert!(result.error.is_none());
	assert_eq!(result.schema_version, Some(SCHEMA_VERSION));
}

#[test]
fn result_builder_error() {
	let result: EmptyResult = ResultBuilder::new("launch")
		.error(ErrorCode::ConnectionNotFound, "session 'db9' not found in Lab configuration")
		.build();

	assert!(!result.ok);
	assert!(result.data.is_none());
	assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::ConnectionNotFound);
}

#[test]
fn data_with_error_is_not_ok() {
	let result: CommandResult<LaunchData> = ResultBuilder::new("launch")
		.data(LaunchData {
			category: "Lab".into(),
			sessions: Vec::new(),
			succeeded: 0,
			failed: 1,
		})
		.error(ErrorCode::LaunchFailed, "1 of 1 launches failed")
		.build();

	assert!(!result.ok);
	assert!(result.data.is_some());
}

#[test]
fn error_code_display_matches_serde() {
	assert_eq!(ErrorCode::ConnectionNotFound.to_string(), "CONNECTION_NOT_FOUND");
	assert_eq!(ErrorCode::ConfigInvalid.to_string(), "CONFIG_INVALID");
	assert_eq!(
		serde_json::to_value(ErrorCode::WriteFailed).unwrap(),
		serde_json::json!("WRITE_FAILED")
	);
}

#[test]
fn serialize_uses_camel_case_envelope() {
	let result: CommandResult<ConnectionData> = ResultBuilder::new("show")
		.data(connection())
		.diagnostic(DiagnosticLevel::Warning, "registry file is damaged")
		.build();

	let json = serde_json::to_value(&result).unwrap();
	assert_eq!(json["ok"], true);
	assert_eq!(json["schemaVersion"], 1);
	assert_eq!(json["data"]["command"], "ssh user@db1.internal");
	assert_eq!(json["diagnostics"][0]["level"], "warning");
	assert!(json["timings"]["durationMs"].is_u64());
}

#[test]
fn saved_data_flattens_change() {
	let saved = SavedData {
		change: connection(),
		config: PathBuf::from("config.json"),
		backup: Some(PathBuf::from("config.json.bak.1")),
	};

	let json = serde_json::to_value(&saved).unwrap();
	assert_eq!(json["name"], "db1");
	assert_eq!(json["backup"], "config.json.bak.1");
}

#[test]
fn list_text_shows_empty_categories() {
	colored::control::set_override(false);
	let data = ListData {
		categories: vec![
			CategoryListing {
				name: "Lab".into(),
				connections: vec![connection()],
			},
			CategoryListing {
				name: "Tools".into(),
				connections: Vec::new(),
			},
		],
		connection_count: 1,
	};

	let mut out = Vec::new();
	data.write_text(&mut out).unwrap();
	let text = String::from_utf8(out).unwrap();
	assert!(text.starts_with("Lab\n  db1"));
	assert!(text.contains("ssh user@db1.internal"));
	assert!(text.ends_with("Tools\n  (empty)\n"));
}

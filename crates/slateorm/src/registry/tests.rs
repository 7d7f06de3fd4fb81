use super::*;
use crate::row::assign_cell;

#[derive(Debug, Default)]
struct Audit {
    created_by: String,
}

static AUDIT_FIELDS: [FieldDef; 1] = [FieldDef::new("created_by")];

impl Record for Audit {
    const TYPE_NAME: &'static str = "Audit";

    fn fields() -> &'static [FieldDef] {
        &AUDIT_FIELDS
    }

    fn assign(&mut self, attr: &str, cell: Option<&[u8]>) -> Option<OrmResult<()>> {
        match attr {
            "created_by" => Some(assign_cell(&mut self.created_by, attr, cell)),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Account {
    id: i64,
    user_name: String,
    audit: Audit,
}

static ACCOUNT_FIELDS: [FieldDef; 5] = [
    FieldDef::new("id"),
    FieldDef {
        column: Some("name"),
        alias: Some("user_name"),
        table: Some("a"),
        ..FieldDef::new("user_name")
    },
    FieldDef {
        skip: true,
        ..FieldDef::new("scratch")
    },
    FieldDef {
        table_name: true,
        ..FieldDef::new("Accounts")
    },
    FieldDef {
        nested: Some(Audit::fields),
        ..FieldDef::new("audit")
    },
];

impl Record for Account {
    const TYPE_NAME: &'static str = "Account";

    fn fields() -> &'static [FieldDef] {
        &ACCOUNT_FIELDS
    }

    fn assign(&mut self, attr: &str, cell: Option<&[u8]>) -> Option<OrmResult<()>> {
        match attr {
            "id" => Some(assign_cell(&mut self.id, attr, cell)),
            "user_name" => Some(assign_cell(&mut self.user_name, attr, cell)),
            _ => match attr.split_once('.') {
                Some(("audit", rest)) => self.audit.assign(rest, cell),
                _ => None,
            },
        }
    }
}

#[test]
fn test_mapping_defaults_and_overrides() {
    let mapping = TableMapping::build::<Account>().unwrap();
    assert_eq!(mapping.table_name, "accounts");

    let aliases: Vec<_> = mapping.columns().iter().map(|c| c.alias_name.as_str()).collect();
    assert_eq!(aliases, vec!["id", "user_name", "created_by"]);

    let id = mapping.by_alias("id").unwrap();
    assert_eq!(id.column_name, "id");
    assert_eq!(id.qualified_table, "");

    let name = mapping.by_alias("user_name").unwrap();
    assert_eq!(name.attribute_name, "user_name");
    assert_eq!(name.column_name, "name");
    assert_eq!(name.qualified_table, "a");

    assert!(mapping.by_alias("scratch").is_none());
    assert!(mapping.by_alias("accounts").is_none());

    assert_eq!(id.attribute_path, "id");
    let created = mapping.by_alias("created_by").unwrap();
    assert_eq!(created.attribute_name, "created_by");
    assert_eq!(created.attribute_path, "audit.created_by");
}

#[test]
fn test_assign_follows_flatten_path() {
    let mut account = Account::default();
    assert!(matches!(account.assign("audit.created_by", Some(b"ops")), Some(Ok(()))));
    assert!(account.assign("created_by", Some(b"x")).is_none());
    assert_eq!(account.audit.created_by, "ops");
}

#[test]
fn test_select_list_rendering() {
    let mapping = TableMapping::build::<Account>().unwrap();
    assert_eq!(
        mapping.select_list(),
        "`id`,a.`name` `user_name`,`created_by`"
    );
}

#[test]
fn test_type_name_is_default_table() {
    let mapping = TableMapping::build::<Audit>().unwrap();
    assert_eq!(mapping.table_name, "audit");
}

static TWO_MARKERS: [FieldDef; 3] = [
    FieldDef {
        table_name: true,
        ..FieldDef::new("First")
    },
    FieldDef {
        table_name: true,
        ..FieldDef::new("Second")
    },
    FieldDef::new("id"),
];

#[test]
fn test_first_table_marker_wins() {
    let mapping = TableMapping::from_fields("Thing", &TWO_MARKERS).unwrap();
    assert_eq!(mapping.table_name, "first");
    assert_eq!(mapping.columns().len(), 1);
}

static DUPLICATE_ALIAS: [FieldDef; 2] = [
    FieldDef::new("name"),
    FieldDef {
        alias: Some("name"),
        ..FieldDef::new("nickname")
    },
];

#[test]
fn test_duplicate_alias_is_metadata_error() {
    let err = TableMapping::from_fields("Thing", &DUPLICATE_ALIAS).unwrap_err();
    assert!(err.is_metadata());
}

static ONLY_SKIPPED: [FieldDef; 1] = [FieldDef {
    skip: true,
    ..FieldDef::new("x")
}];

#[test]
fn test_no_columns_is_metadata_error() {
    assert!(TableMapping::from_fields("Thing", &ONLY_SKIPPED)
        .unwrap_err()
        .is_metadata());
}

static CYCLE: [FieldDef; 2] = [
    FieldDef::new("id"),
    FieldDef {
        nested: Some(cycle_fields),
        ..FieldDef::new("inner")
    },
];

fn cycle_fields() -> &'static [FieldDef] {
    &CYCLE
}

#[test]
fn test_cyclic_flatten_is_metadata_error() {
    // Each level re-adds `id`; the duplicate alias is caught first.
    assert!(TableMapping::from_fields("Loop", &CYCLE)
        .unwrap_err()
        .is_metadata());
}

#[test]
fn test_registry_caches_mapping() {
    let registry = Registry::new();
    assert!(registry.is_empty());

    let first = registry.resolve::<Account>().unwrap();
    let second = registry.resolve::<Account>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    assert!(registry.contains::<Account>());
}

#[test]
fn test_registry_invalidate() {
    let registry = Registry::new();
    let first = registry.resolve::<Audit>().unwrap();
    assert!(registry.invalidate::<Audit>());
    assert!(!registry.contains::<Audit>());
    assert!(!registry.invalidate::<Audit>());

    let again = registry.resolve::<Audit>().unwrap();
    assert!(!Arc::ptr_eq(&first, &again));
    assert_eq!(*first, *again);
}

#[test]
fn test_concurrent_resolution_is_race_free() {
    let registry = Registry::new();
    let mappings: Vec<Arc<TableMapping>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| registry.resolve::<Account>().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(registry.len(), 1);
    for mapping in &mappings[1..] {
        assert!(Arc::ptr_eq(&mappings[0], mapping));
    }
}

static SELF_NESTED: [FieldDef; 1] = [FieldDef {
    nested: Some(self_nested_fields),
    ..FieldDef::new("again")
}];

fn self_nested_fields() -> &'static [FieldDef] {
    &SELF_NESTED
}

#[test]
fn test_nesting_depth_guard() {
    let err = TableMapping::from_fields("Again", &SELF_NESTED).unwrap_err();
    assert!(err.to_string().contains("nest deeper"));
}

//! End-to-end compilation of the CRM demo schema.

use spec_compiler::config::SchemaConfig;
use spec_compiler::schema::{Schema, SchemaProvider};

const CRM_CONFIG: &str = include_str!("../demos/crm.json");

fn crm() -> Schema {
    let schema = SchemaConfig::from_json_str(CRM_CONFIG)
        .unwrap()
        .into_schema()
        .unwrap();
    schema.check().unwrap();
    schema
}

fn spec_sql(schema: &Schema, name: &str) -> String {
    schema.spec(name).unwrap().to_sql(schema).unwrap()
}

/// Drops the digits of generated names such as `AnnotatedUser17`, leaving
/// literal numbers like `= 1` alone.
fn mask_generated_ids(sql: &str) -> String {
    let mut masked = String::with_capacity(sql.len());
    let mut in_suffix = false;
    let mut previous = ' ';
    for c in sql.chars() {
        if c.is_ascii_digit() && (in_suffix || previous.is_ascii_alphabetic()) {
            in_suffix = true;
        } else {
            in_suffix = false;
            masked.push(c);
        }
        previous = c;
    }
    masked
}

#[test]
fn test_is_manager() {
    let schema = crm();
    assert_eq!(
        spec_sql(&schema, "isManager"),
        "SELECT [User].* FROM [User]\nWHERE ([User].[Type] = 'Manager')"
    );
}

#[test]
fn test_spec_reference_matches_inlined_path() {
    let schema = crm();
    let one = spec_sql(&schema, "ownerIsManager1");
    let two = spec_sql(&schema, "ownerIsManager2");
    assert_eq!(one, two);
    assert_eq!(
        one,
        "SELECT [Account].* FROM [Account]\n\
         INNER JOIN [User] [Account.Owner] ON [Account.Owner].[Id] = [Account].[OwnerId]\n\
         WHERE ([Account.Owner].[Type] = 'Manager')"
    );
}

#[test]
fn test_has_manager_owned_account_formulations_agree() {
    let schema = crm();
    let sqls: Vec<String> = (1..=4)
        .map(|i| spec_sql(&schema, &format!("hasManagerOwnedAccount{}", i)))
        .map(|sql| mask_generated_ids(&sql))
        .collect();

    for sql in &sqls[1..] {
        assert_eq!(&sqls[0], sql);
    }
    assert_eq!(
        sqls[0],
        "WITH [AnnotatedUser] AS (\n\
         SELECT [User].[Id], 1 [AnyAccount]\n\
         FROM [User]\n\
         LEFT JOIN [Account] ON [Account].[OwnerId] = [User].[Id]\n\
         INNER JOIN [User] [Account.Owner] ON [Account.Owner].[Id] = [Account].[OwnerId]\n\
         WHERE ([Account.Owner].[Type] = 'Manager')\n\
         )\n\
         SELECT [User].* FROM [User]\n\
         LEFT JOIN [AnnotatedUser] ON [AnnotatedUser].[Id] = [User].[Id]\n\
         WHERE [AnnotatedUser].[AnyAccount] = 1"
    );
}

#[test]
fn test_none_and_all() {
    let schema = crm();

    let none = mask_generated_ids(&spec_sql(&schema, "hasNoOpenAccounts"));
    assert!(none.contains("SELECT [User].[Id], 1 [NoAccount]\n"));
    assert!(none.contains("WHERE NOT([Account].[IsClosed] = 1)\n"));
    assert!(none.ends_with("WHERE [AnnotatedUser].[NoAccount] != 1"));

    let all = mask_generated_ids(&spec_sql(&schema, "allAccountsFunded"));
    assert!(all.contains("SELECT DISTINCT [User].[Id], 1 [AnyNotAccount]\n"));
    assert!(all.contains("WHERE NOT(([Account].[Balance] > 0))\n"));
    assert!(all.ends_with("WHERE [AnnotatedUser].[AnyNotAccount] != 1"));
}

#[test]
fn test_repeated_parent_path_joins_once() {
    let schema = crm();
    let sql = schema
        .compile_expression(
            "Account",
            "Account.Owner.Name = 'bob' or Account.Owner.Type = 'Manager'",
        )
        .unwrap();
    assert_eq!(sql.matches("INNER JOIN [User]").count(), 1);
}

#[test]
fn test_ad_hoc_expressions() {
    let schema = crm();

    let sql = schema
        .compile_expression("User", "hasManagerOwnedAccount1(User) and User.Name != null")
        .unwrap();
    assert!(sql.starts_with("WITH [AnnotatedUser"));
    assert!(sql.contains("AND ([User].[Name] != NULL))"));

    let err = schema
        .compile_expression("User", "Account.Balance > 0")
        .unwrap_err();
    assert!(err.to_string().contains("not to a joined table: Account"));

    let err = schema.compile_expression("User", "User.Name > 3").unwrap_err();
    assert!(err.to_string().contains("incompatible types"));

    let err = schema.compile_expression("User", "'open").unwrap_err();
    assert!(err.to_string().contains("not closed"));
}

#[test]
fn test_ids_are_unique_across_specs() {
    let schema = crm();
    let one = spec_sql(&schema, "hasManagerOwnedAccount1");
    let two = spec_sql(&schema, "hasManagerOwnedAccount2");
    assert_ne!(one, two);
}

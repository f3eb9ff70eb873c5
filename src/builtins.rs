//! The aggregate reducers `ANY`, `NONE` and `ALL`.
//!
//! `ANY(Child, predicate)` evaluated on a parent table becomes a CTE that
//! marks every parent row with a matching child, a `LEFT JOIN` from the root
//! to that CTE, and a test on the marker column:
//!
//! ```text
//! [AnnotatedBar7] AS (
//! SELECT [Bar].[Id], 1 [AnyFoo7]
//! FROM [Bar]
//! LEFT JOIN [Foo] ON [Foo].[BarId] = [Bar].[Id]
//! WHERE <predicate over Foo>
//! )
//!
//! LEFT JOIN [AnnotatedBar7] ON [AnnotatedBar7].[Id] = [Bar].[Id]
//! WHERE [AnnotatedBar7].[AnyFoo7] = 1
//! ```
//!
//! When the root is an alias (a spec invoked on `Foo.Bar`), the CTE is joined
//! as `[Foo.Bar.AnnotatedBar7]` and the marker is read through that alias.

use tracing::debug;

use crate::ast::{Expr, NodeId};
use crate::schema::SchemaProvider;
use crate::sql_compiler::{CompileError, Sqlizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducer {
    Any,
    None,
    All,
}

impl Reducer {
    /// Case-insensitive lookup by name.
    pub fn lookup(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "any" => Some(Reducer::Any),
            "none" => Some(Reducer::None),
            "all" => Some(Reducer::All),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Reducer::Any => "ANY",
            Reducer::None => "NONE",
            Reducer::All => "ALL",
        }
    }

    /// Prefix of the marker column name.
    pub fn prefix(self) -> &'static str {
        match self {
            Reducer::Any => "Any",
            Reducer::None => "No",
            Reducer::All => "AnyNot",
        }
    }

    /// Test applied to the marker column in the outer predicate.
    pub fn suffix(self) -> &'static str {
        match self {
            Reducer::Any => " = 1",
            Reducer::None | Reducer::All => " != 1",
        }
    }

    /// `ALL` looks for a child that fails the predicate.
    pub fn inverts(self) -> bool {
        matches!(self, Reducer::All)
    }

    pub fn distinct(self) -> bool {
        matches!(self, Reducer::All)
    }
}

/// Expands `reducer(arguments)` on the root table of `sqlizer`, registering
/// its CTE and join there. Returns the outer predicate.
pub fn expand(
    sqlizer: &mut Sqlizer<'_>,
    reducer: Reducer,
    id: NodeId,
    arguments: &[Expr],
) -> Result<String, CompileError> {
    let schema = sqlizer.schema();

    let (child_ref, predicate) = match arguments {
        [child] => (child, None),
        [child, predicate] => (child, Some(predicate)),
        _ => {
            return Err(CompileError::new(format!(
                "{} takes a child reference and an optional predicate, found {} arguments",
                reducer.name(),
                arguments.len()
            )))
        }
    };
    let child_ref = child_ref
        .as_reference()
        .filter(|r| matches!(r.len(), 1 | 2))
        .ok_or_else(|| CompileError::new("builtin requires reference parameter"))?;

    let parent = schema
        .table(sqlizer.table())
        .ok_or_else(|| CompileError::new(format!("table not found: {}", sqlizer.table())))?;
    let child = schema
        .table(child_ref.first())
        .ok_or_else(|| CompileError::new(format!("table not found: {}", child_ref.first())))?;

    let relationship = match child_ref.segments.get(1) {
        Some(name) => child.parent(name).filter(|p| p.table == parent.name),
        None => child.relationship_to(&parent.name),
    }
    .ok_or_else(|| {
        CompileError::new(format!(
            "no relationship from {} to {}",
            child.name, parent.name
        ))
    })?;

    let id = predicate.map_or(id, |p| p.id);
    let cte_name = format!("Annotated{}{}", parent.name, id);
    let marker = format!("{}{}{}", reducer.prefix(), child.name, id);

    let mut nested = Sqlizer::new(schema, &child.name);
    let condition = match predicate {
        Some(predicate) => predicate.walk_postorder(&mut nested)?,
        None => format!("[{}].[{}] IS NOT NULL", child.name, child.id),
    };
    let condition = if reducer.inverts() {
        format!("NOT({})", condition)
    } else {
        condition
    };

    let mut lines = vec![
        format!("[{}] AS (", cte_name),
        format!(
            "SELECT{} [{}].[{}], 1 [{}]",
            if reducer.distinct() { " DISTINCT" } else { "" },
            parent.name,
            parent.id,
            marker
        ),
        format!("FROM [{}]", parent.name),
        format!(
            "LEFT JOIN [{}] ON [{}].[{}] = [{}].[{}]",
            child.name, child.name, relationship.id, parent.name, parent.id
        ),
    ];
    lines.extend(nested.joins().map(str::to_string));
    lines.push(format!("WHERE {}", condition));
    lines.push(")".to_string());

    debug!(
        reducer = reducer.name(),
        parent = %parent.name,
        child = %child.name,
        %cte_name,
        "expanded builtin"
    );

    for cte in nested.ctes() {
        sqlizer.add_cte(cte.clone());
    }
    sqlizer.add_cte(lines.join("\n"));

    // An inlined spec reuses its node ids, so each call site aliases the CTE
    // under its own root.
    let root = sqlizer.root().to_string();
    let (alias, join) = if root == parent.name {
        let join = format!(
            "LEFT JOIN [{0}] ON [{0}].[{1}] = [{2}].[{1}]",
            cte_name, parent.id, root
        );
        (cte_name, join)
    } else {
        let alias = format!("{}.{}", root, cte_name);
        let join = format!(
            "LEFT JOIN [{0}] [{1}] ON [{1}].[{2}] = [{3}].[{2}]",
            cte_name, alias, parent.id, root
        );
        (alias, join)
    };
    sqlizer.add_join(alias.clone(), join);

    Ok(format!("[{}].[{}]{}", alias, marker, reducer.suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType, Parent, Schema, Table};

    fn create_test_schema() -> Schema {
        let bar = Table::new(
            "Bar",
            "Id",
            vec![Field::new("Id", FieldType::Number)],
            vec![],
        )
        .unwrap();
        let qux = Table::new(
            "Qux",
            "Id",
            vec![
                Field::new("Id", FieldType::Number),
                Field::new("Name", FieldType::String),
            ],
            vec![],
        )
        .unwrap();
        let foo = Table::new(
            "Foo",
            "Id",
            vec![
                Field::new("Id", FieldType::Number),
                Field::new("BarId", FieldType::Number),
                Field::new("OtherBarId", FieldType::Number),
                Field::new("QuxId", FieldType::Number),
                Field::new("IsBaz", FieldType::Boolean),
            ],
            vec![
                Parent::new("Bar", "Bar", "BarId"),
                Parent::new("OtherBar", "Bar", "OtherBarId"),
                Parent::new("Qux", "Qux", "QuxId"),
            ],
        )
        .unwrap();
        let zot = Table::new(
            "Zot",
            "Id",
            vec![
                Field::new("Id", FieldType::Number),
                Field::new("FooId", FieldType::Number),
            ],
            vec![Parent::new("Foo", "Foo", "FooId")],
        )
        .unwrap();
        Schema::new(vec![bar, qux, foo, zot]).unwrap()
    }

    /// Compiles `source` on `Bar`; returns the parsed expression, predicate, CTEs and joins.
    fn compile(schema: &Schema, source: &str) -> (Expr, String, Vec<String>, Vec<String>) {
        let expr = schema.parse_expression(source).unwrap();
        let mut sqlizer = Sqlizer::new(schema, "Bar");
        let sql = expr.walk_postorder(&mut sqlizer).unwrap();
        let ctes = sqlizer.ctes().to_vec();
        let joins = sqlizer.joins().map(str::to_string).collect();
        (expr, sql, ctes, joins)
    }

    /// Node id of the predicate argument of a top-level reducer call.
    fn predicate_id(expr: &Expr) -> NodeId {
        match &expr.kind {
            crate::ast::ExprKind::MacroExpansion { arguments, .. } => arguments[1].id,
            _ => panic!("not a macro expansion"),
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Reducer::lookup("any"), Some(Reducer::Any));
        assert_eq!(Reducer::lookup("None"), Some(Reducer::None));
        assert_eq!(Reducer::lookup("ALL"), Some(Reducer::All));
        assert_eq!(Reducer::lookup("some"), None);
    }

    #[test]
    fn test_any() {
        let schema = create_test_schema();
        let (expr, sql, ctes, joins) = compile(&schema, "ANY(Foo, Foo.IsBaz)");
        let id = predicate_id(&expr);

        assert_eq!(sql, format!("[AnnotatedBar{id}].[AnyFoo{id}] = 1"));
        assert_eq!(
            ctes,
            vec![format!(
                "[AnnotatedBar{id}] AS (\n\
                 SELECT [Bar].[Id], 1 [AnyFoo{id}]\n\
                 FROM [Bar]\n\
                 LEFT JOIN [Foo] ON [Foo].[BarId] = [Bar].[Id]\n\
                 WHERE [Foo].[IsBaz] = 1\n\
                 )"
            )]
        );
        assert_eq!(
            joins,
            vec![format!(
                "LEFT JOIN [AnnotatedBar{id}] ON [AnnotatedBar{id}].[Id] = [Bar].[Id]"
            )]
        );
    }

    #[test]
    fn test_none() {
        let schema = create_test_schema();
        let (expr, sql, ctes, _) = compile(&schema, "none(Foo, Foo.IsBaz)");
        let id = predicate_id(&expr);

        assert_eq!(sql, format!("[AnnotatedBar{id}].[NoFoo{id}] != 1"));
        assert!(ctes[0].contains(&format!("SELECT [Bar].[Id], 1 [NoFoo{id}]")));
        assert!(ctes[0].contains("WHERE [Foo].[IsBaz] = 1\n"));
    }

    #[test]
    fn test_all() {
        let schema = create_test_schema();
        let (expr, sql, ctes, _) = compile(&schema, "All(Foo, Foo.IsBaz)");
        let id = predicate_id(&expr);

        assert_eq!(sql, format!("[AnnotatedBar{id}].[AnyNotFoo{id}] != 1"));
        assert!(ctes[0].contains(&format!("SELECT DISTINCT [Bar].[Id], 1 [AnyNotFoo{id}]")));
        assert!(ctes[0].contains("WHERE NOT([Foo].[IsBaz] = 1)\n"));
    }

    #[test]
    fn test_nested_joins_stay_inside_cte() {
        let schema = create_test_schema();
        let (_, _, ctes, joins) = compile(&schema, "ANY(Foo, Foo.Qux.Name = 'x')");
        assert!(ctes[0].contains(
            "LEFT JOIN [Foo] ON [Foo].[BarId] = [Bar].[Id]\n\
             INNER JOIN [Qux] [Foo.Qux] ON [Foo.Qux].[Id] = [Foo].[QuxId]\n\
             WHERE ([Foo.Qux].[Name] = 'x')"
        ));
        assert_eq!(joins.len(), 1);
    }

    #[test]
    fn test_without_predicate() {
        let schema = create_test_schema();
        let (expr, sql, ctes, _) = compile(&schema, "ANY(Foo)");
        let id = expr.id;
        assert_eq!(sql, format!("[AnnotatedBar{id}].[AnyFoo{id}] = 1"));
        assert!(ctes[0].contains("WHERE [Foo].[Id] IS NOT NULL\n"));
    }

    #[test]
    fn test_explicit_relationship() {
        let schema = create_test_schema();
        let (_, _, ctes, _) = compile(&schema, "ANY(Foo.OtherBar, Foo.IsBaz)");
        assert!(ctes[0].contains("LEFT JOIN [Foo] ON [Foo].[OtherBarId] = [Bar].[Id]"));
    }

    #[test]
    fn test_nested_reducers_lift_inner_ctes() {
        let schema = create_test_schema();
        let (_, sql, ctes, joins) = compile(&schema, "ANY(Foo, ANY(Zot, Zot.Id = 1))");

        assert_eq!(ctes.len(), 2);
        assert!(ctes[0].starts_with("[AnnotatedFoo"));
        assert!(ctes[0].contains("LEFT JOIN [Zot] ON [Zot].[FooId] = [Foo].[Id]"));
        assert!(ctes[1].starts_with("[AnnotatedBar"));
        // the inner reducer's join lives in the outer CTE body
        assert!(ctes[1].contains("LEFT JOIN [AnnotatedFoo"));
        assert!(ctes[1].contains("= [Foo].[Id]\nWHERE [AnnotatedFoo"));

        assert_eq!(joins.len(), 1);
        assert!(sql.starts_with("[AnnotatedBar"));
    }

    #[test]
    fn test_missing_relationship() {
        let schema = create_test_schema();
        let expr = schema.parse_expression("ANY(Bar, true)").unwrap();
        let err = expr
            .walk_postorder(&mut Sqlizer::new(&schema, "Qux"))
            .unwrap_err();
        assert_eq!(err.message, "no relationship from Bar to Qux");

        let expr = schema.parse_expression("ANY(Foo.Qux, true)").unwrap();
        let err = expr
            .walk_postorder(&mut Sqlizer::new(&schema, "Bar"))
            .unwrap_err();
        assert_eq!(err.message, "no relationship from Foo to Bar");
    }

    #[test]
    fn test_requires_reference() {
        let schema = create_test_schema();
        let expr = schema.parse_expression("ANY(1, true)").unwrap();
        let err = expr
            .walk_postorder(&mut Sqlizer::new(&schema, "Bar"))
            .unwrap_err();
        assert_eq!(err.message, "builtin requires reference parameter");
    }
}

/// Query descriptor → ClickHouse SQL compiler.
///
/// The store has no transactional UPDATE, no RETURNING clause and no
/// server-side binding for every call shape, so every method returns a
/// [`Statement`] whose parameters are inlined at render time.
use crate::error::{Error, Result, Unsupported};
use crate::identifier::Wrapper;
use crate::statement::Statement;
use crate::value::Record;

use super::types::*;

#[derive(Debug, Clone, Default)]
pub struct QueryGrammar {
    wrapper: Wrapper,
}

impl QueryGrammar {
    pub fn new(table_prefix: impl Into<String>) -> Self {
        Self {
            wrapper: Wrapper::new(table_prefix),
        }
    }

    /// `from <base> [as <alias>]`. Raw expressions pass through unmodified.
    /// Named tables are prefixed exactly like write targets.
    pub fn compile_from(&self, table: &TableRef) -> String {
        format!("from {}", self.wrap_target(table))
    }

    fn wrap_target(&self, table: &TableRef) -> String {
        match table {
            TableRef::Raw(expr) => expr.clone(),
            TableRef::Name(name) => self.wrapper.wrap_table(name),
        }
    }

    pub fn compile_select(&self, query: &Query) -> Result<Statement> {
        let columns = if query.columns.is_empty() {
            "*".to_string()
        } else {
            self.wrapper.columnize(query.columns.iter().map(String::as_str))
        };

        let mut stmt = Statement::text(format!("select {} {}", columns, self.compile_from(&query.from)));
        self.compile_tail(&mut stmt, query)?;

        if !query.orders.is_empty() {
            let orders: Vec<String> = query
                .orders
                .iter()
                .map(|(column, direction)| {
                    let dir = match direction {
                        Direction::Asc => "asc",
                        Direction::Desc => "desc",
                    };
                    format!("{} {}", self.wrapper.wrap(column), dir)
                })
                .collect();
            stmt.push_str(&format!(" order by {}", orders.join(", ")));
        }
        if let Some(limit) = query.limit {
            stmt.push_str(&format!(" limit {}", limit));
        }
        if let Some(offset) = query.offset {
            stmt.push_str(&format!(" offset {}", offset));
        }
        Ok(stmt)
    }

    /// `select count(*) as aggregate …` over the query's table, joins and predicates.
    pub fn compile_count(&self, query: &Query) -> Result<Statement> {
        let mut stmt = Statement::text(format!(
            "select count(*) as aggregate {}",
            self.compile_from(&query.from)
        ));
        self.compile_tail(&mut stmt, query)?;
        Ok(stmt)
    }

    fn compile_tail(&self, stmt: &mut Statement, query: &Query) -> Result<()> {
        for join in &query.joins {
            stmt.push_str(" ");
            stmt.append(self.compile_join(join)?);
        }
        let wheres = self.compile_wheres(&query.wheres)?;
        if !wheres.is_empty() {
            stmt.push_str(" ");
            stmt.append(wheres);
        }
        Ok(())
    }

    fn compile_join(&self, join: &Join) -> Result<Statement> {
        let mut stmt = Statement::text(format!(
            "{} {}",
            join.kind.keyword(),
            self.wrap_target(&join.table)
        ));
        if join.kind != JoinKind::Cross && !join.on.is_empty() {
            stmt.push_str(" on ");
            stmt.append(self.compile_conditions(&join.on)?);
        }
        Ok(stmt)
    }

    /// `where …`, or an empty statement when there are no predicates.
    pub fn compile_wheres(&self, wheres: &[Where]) -> Result<Statement> {
        if wheres.is_empty() {
            return Ok(Statement::new());
        }
        let mut stmt = Statement::text("where ");
        stmt.append(self.compile_conditions(wheres)?);
        Ok(stmt)
    }

    fn compile_conditions(&self, wheres: &[Where]) -> Result<Statement> {
        let mut stmt = Statement::new();
        for (i, w) in wheres.iter().enumerate() {
            if i > 0 {
                stmt.push_str(&format!(" {} ", w.boolean.keyword()));
            }
            self.compile_predicate(&mut stmt, &w.predicate)?;
        }
        Ok(stmt)
    }

    fn compile_predicate(&self, stmt: &mut Statement, predicate: &Predicate) -> Result<()> {
        match predicate {
            Predicate::Basic {
                column,
                operator,
                value,
            } => {
                stmt.push_str(&format!("{} {} ", self.wrapper.wrap(column), operator.as_sql()));
                stmt.push_param(value.clone());
            }
            Predicate::Column {
                first,
                operator,
                second,
            } => {
                stmt.push_str(&format!(
                    "{} {} {}",
                    self.wrapper.wrap(first),
                    operator.as_sql(),
                    self.wrapper.wrap(second)
                ));
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    // Empty list: `in` matches nothing, `not in` matches everything.
                    stmt.push_str(if *negated { "1 = 1" } else { "0 = 1" });
                    return Ok(());
                }
                let not = if *negated { "not " } else { "" };
                stmt.push_str(&format!("{} {}in (", self.wrapper.wrap(column), not));
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        stmt.push_str(", ");
                    }
                    stmt.push_param(value.clone());
                }
                stmt.push_str(")");
            }
            Predicate::Null { column, negated } => {
                let not = if *negated { "not " } else { "" };
                stmt.push_str(&format!("{} is {}null", self.wrapper.wrap(column), not));
            }
            Predicate::Between {
                column,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "not " } else { "" };
                stmt.push_str(&format!("{} {}between ", self.wrapper.wrap(column), not));
                stmt.push_param(low.clone());
                stmt.push_str(" and ");
                stmt.push_param(high.clone());
            }
            Predicate::Raw { sql, bindings } => stmt.push_raw(sql, bindings)?,
            Predicate::Nested(inner) => {
                if inner.is_empty() {
                    stmt.push_str("1 = 1");
                    return Ok(());
                }
                stmt.push_str("(");
                stmt.append(self.compile_conditions(inner)?);
                stmt.push_str(")");
            }
        }
        Ok(())
    }

    /// `insert into <table> (<columns>) values (<row>), …`
    ///
    /// Columns come from the first record. The other records are assumed to
    /// share its column set; a record with different keys is not checked and
    /// its values land in whatever columns its position lines up with.
    pub fn compile_insert(&self, query: &Query, values: impl Into<InsertValues>) -> Statement {
        let table = self.wrap_target(&query.from);
        let records = values.into().into_batch();

        let Some(first) = records.first().filter(|r| !r.is_empty()) else {
            return Statement::text(format!("insert into {} default values", table));
        };

        let columns = self.wrapper.columnize(first.columns());
        let mut stmt = Statement::text(format!("insert into {} ({}) values ", table, columns));
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                stmt.push_str(", ");
            }
            self.push_row(&mut stmt, record);
        }
        stmt
    }

    fn push_row(&self, stmt: &mut Statement, record: &Record) {
        stmt.push_str("(");
        for (i, value) in record.values().enumerate() {
            if i > 0 {
                stmt.push_str(", ");
            }
            stmt.push_param(value.clone());
        }
        stmt.push_str(")");
    }

    /// Same statement as [`QueryGrammar::compile_insert`]. There is no
    /// RETURNING clause; the id must already be in `values`, stamped by an
    /// [`crate::sequence::IdentifierGenerator`].
    pub fn compile_insert_get_id(&self, query: &Query, values: impl Into<InsertValues>) -> Statement {
        self.compile_insert(query, values)
    }

    /// `alter table <t> update <col> = <value>, … where …`
    ///
    /// The store applies this as an asynchronous mutation. It is not an
    /// immediately consistent row update and reports no affected-row count.
    pub fn compile_update(&self, query: &Query, values: &Record) -> Result<Statement> {
        if !query.joins.is_empty() {
            return Err(Error::Unsupported(Unsupported::UpdateWithJoins));
        }
        if query.limit.is_some() {
            return Err(Error::Unsupported(Unsupported::UpdateWithLimit));
        }

        let mut stmt = Statement::text(format!(
            "alter table {} update ",
            self.wrap_target(&query.from)
        ));
        for (i, (column, value)) in values.columns().zip(values.values()).enumerate() {
            if i > 0 {
                stmt.push_str(", ");
            }
            stmt.push_str(&format!("{} = ", self.wrapper.wrap(column)));
            stmt.push_param(value.clone());
        }
        stmt.push_str(" ");
        stmt.append(self.compile_mutation_filter(&query.wheres)?);
        Ok(stmt)
    }

    /// `alter table <t> delete where …`, with the same restrictions as update.
    pub fn compile_delete(&self, query: &Query) -> Result<Statement> {
        if !query.joins.is_empty() {
            return Err(Error::Unsupported(Unsupported::DeleteWithJoins));
        }
        if query.limit.is_some() {
            return Err(Error::Unsupported(Unsupported::DeleteWithLimit));
        }

        let mut stmt = Statement::text(format!(
            "alter table {} delete ",
            self.wrap_target(&query.from)
        ));
        stmt.append(self.compile_mutation_filter(&query.wheres)?);
        Ok(stmt)
    }

    // Mutations require a WHERE clause.
    fn compile_mutation_filter(&self, wheres: &[Where]) -> Result<Statement> {
        if wheres.is_empty() {
            return Ok(Statement::text("where 1"));
        }
        self.compile_wheres(wheres)
    }

    pub fn compile_truncate(&self, query: &Query) -> Statement {
        Statement::text(format!("truncate {}", self.wrap_target(&query.from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::NativeEscaper;
    use crate::value::Value;
    use sqlparser::dialect::ClickHouseDialect;
    use sqlparser::parser::Parser;

    fn render(stmt: &Statement) -> String {
        stmt.render(&NativeEscaper)
    }

    fn grammar() -> QueryGrammar {
        QueryGrammar::default()
    }

    #[test]
    fn test_compile_from_plain() {
        let g = grammar();
        assert_eq!(g.compile_from(&"events".into()), "from \"events\"");
    }

    #[test]
    fn test_compile_from_alias() {
        let g = grammar();
        assert_eq!(g.compile_from(&"events as e".into()), "from \"events\" as \"e\"");
        assert_eq!(g.compile_from(&"events AS e".into()), "from \"events\" as \"e\"");
    }

    #[test]
    fn test_compile_from_prefix_only_on_base() {
        let g = QueryGrammar::new("app_");
        assert_eq!(g.compile_from(&"events as e".into()), "from \"app_events\" as \"e\"");
    }

    #[test]
    fn test_prefix_lands_on_same_table_for_reads_and_writes() {
        let g = QueryGrammar::new("app_");
        let q = Query::table("analytics.events");
        assert_eq!(g.compile_from(&q.from), "from \"analytics\".\"app_events\"");
        assert_eq!(render(&g.compile_truncate(&q)), "truncate \"analytics\".\"app_events\"");
        assert!(render(&g.compile_insert(&q, Record::new().with("a", 1)))
            .starts_with("insert into \"analytics\".\"app_events\" "));
        assert_eq!(
            g.compile_from(&"analytics.events as e".into()),
            "from \"analytics\".\"app_events\" as \"e\""
        );
    }

    #[test]
    fn test_compile_from_raw_and_function() {
        let g = grammar();
        assert_eq!(
            g.compile_from(&TableRef::Raw("(select 1) as sub".into())),
            "from (select 1) as sub"
        );
        assert_eq!(g.compile_from(&"numbers(10)".into()), "from numbers(10)");
    }

    #[test]
    fn test_compile_insert_empty_is_default_values() {
        let g = grammar();
        let stmt = g.compile_insert(&Query::table("t"), Vec::<Record>::new());
        assert_eq!(render(&stmt), "insert into \"t\" default values");
        let stmt = g.compile_insert(&Query::table("t"), Record::new());
        assert_eq!(render(&stmt), "insert into \"t\" default values");
    }

    #[test]
    fn test_compile_insert_batch_led_by_empty_record() {
        let g = grammar();
        let stmt = g.compile_insert(&Query::table("t"), vec![Record::new(), Record::new()]);
        assert_eq!(render(&stmt), "insert into \"t\" default values");
    }

    #[test]
    fn test_compile_insert_single_record() {
        let g = grammar();
        let stmt = g.compile_insert(&Query::table("t"), Record::new().with("a", 1).with("b", 2));
        assert_eq!(render(&stmt), "insert into \"t\" (\"a\", \"b\") values (1, 2)");
    }

    #[test]
    fn test_compile_insert_batch_escapes_values() {
        let g = grammar();
        let rows = vec![
            Record::new().with("a", 1).with("b", "x"),
            Record::new().with("a", 2).with("b", "it's"),
        ];
        let stmt = g.compile_insert(&Query::table("t"), rows);
        assert_eq!(
            render(&stmt),
            r#"insert into "t" ("a", "b") values (1, 'x'), (2, 'it\'s')"#
        );
        assert_eq!(stmt.params().count(), 4);
    }

    #[test]
    fn test_compile_insert_divergent_records_misalign() {
        // Columns come from the first record only; nothing is validated.
        let g = grammar();
        let rows = vec![
            Record::new().with("a", 1).with("b", 2),
            Record::new().with("b", 3).with("c", 4),
        ];
        let stmt = g.compile_insert(&Query::table("t"), rows);
        assert_eq!(
            render(&stmt),
            "insert into \"t\" (\"a\", \"b\") values (1, 2), (3, 4)"
        );
    }

    #[test]
    fn test_compile_insert_get_id_same_shape() {
        let g = grammar();
        let record = Record::new().with("id", 10u64).with("a", 1);
        let a = g.compile_insert(&Query::table("t"), record.clone());
        let b = g.compile_insert_get_id(&Query::table("t"), record);
        assert_eq!(a, b);
    }

    #[test]
    fn test_compile_update() {
        let g = grammar();
        let q = Query::table("t").where_eq("id", 5);
        let stmt = g
            .compile_update(&q, &Record::new().with("a", "x").with("b", 2))
            .unwrap();
        assert_eq!(
            render(&stmt),
            "alter table \"t\" update \"a\" = 'x', \"b\" = 2 where \"id\" = 5"
        );
    }

    #[test]
    fn test_compile_update_without_wheres() {
        let g = grammar();
        let stmt = g
            .compile_update(&Query::table("t"), &Record::new().with("a", 1))
            .unwrap();
        assert_eq!(render(&stmt), "alter table \"t\" update \"a\" = 1 where 1");
    }

    #[test]
    fn test_compile_update_rejects_joins() {
        let g = grammar();
        let q = Query::table("t").join("u", "t.uid", Operator::Eq, "u.id");
        let err = g.compile_update(&q, &Record::new().with("a", 1)).unwrap_err();
        assert!(matches!(err, Error::Unsupported(Unsupported::UpdateWithJoins)));
    }

    #[test]
    fn test_compile_update_rejects_limit() {
        let g = grammar();
        let q = Query::table("t").limit(1);
        let err = g.compile_update(&q, &Record::new().with("a", 1)).unwrap_err();
        assert!(matches!(err, Error::Unsupported(Unsupported::UpdateWithLimit)));
    }

    #[test]
    fn test_compile_delete() {
        let g = grammar();
        let q = Query::table("t").where_in("id", vec![1, 2]);
        let stmt = g.compile_delete(&q).unwrap();
        assert_eq!(render(&stmt), "alter table \"t\" delete where \"id\" in (1, 2)");
        assert!(g.compile_delete(&q.limit(3)).is_err());
    }

    #[test]
    fn test_compile_truncate() {
        let g = grammar();
        assert_eq!(render(&g.compile_truncate(&Query::table("t"))), "truncate \"t\"");
    }

    #[test]
    fn test_compile_select_full() {
        let g = grammar();
        let q = Query::table("events as e")
            .select(["e.id", "u.name"])
            .join("users as u", "e.uid", Operator::Eq, "u.id")
            .where_eq("e.kind", "click")
            .or_where("e.score", Operator::Gt, 10)
            .where_not_null("u.name")
            .order_by("e.id", Direction::Desc)
            .limit(10)
            .offset(20);
        let stmt = g.compile_select(&q).unwrap();
        assert_eq!(
            render(&stmt),
            "select \"e\".\"id\", \"u\".\"name\" from \"events\" as \"e\" \
             inner join \"users\" as \"u\" on \"e\".\"uid\" = \"u\".\"id\" \
             where \"e\".\"kind\" = 'click' or \"e\".\"score\" > 10 and \"u\".\"name\" is not null \
             order by \"e\".\"id\" desc limit 10 offset 20"
        );
    }

    #[test]
    fn test_compile_wheres_variants() {
        let g = grammar();
        let q = Query::table("t")
            .where_between("n", 1, 5)
            .where_in("k", Vec::<i64>::new())
            .where_not_in("k", Vec::<i64>::new())
            .where_raw("lower(name) = ?", vec![Value::from("bob")])
            .where_nested(
                Boolean::Or,
                vec![
                    Where {
                        boolean: Boolean::And,
                        predicate: Predicate::Null {
                            column: "a".into(),
                            negated: false,
                        },
                    },
                    Where {
                        boolean: Boolean::Or,
                        predicate: Predicate::Basic {
                            column: "b".into(),
                            operator: Operator::Like,
                            value: Value::from("%x%"),
                        },
                    },
                ],
            );
        let stmt = g.compile_wheres(&q.wheres).unwrap();
        assert_eq!(
            render(&stmt),
            "where \"n\" between 1 and 5 and 0 = 1 and 1 = 1 and lower(name) = 'bob' \
             or (\"a\" is null or \"b\" like '%x%')"
        );
    }

    #[test]
    fn test_raw_where_mismatch_fails() {
        let g = grammar();
        let q = Query::table("t").where_raw("a = ? and b = ?", vec![Value::from(1)]);
        assert!(matches!(
            g.compile_select(&q),
            Err(Error::PlaceholderMismatch { .. })
        ));
    }

    #[test]
    fn test_compile_count() {
        let g = grammar();
        let stmt = g.compile_count(&Query::table("t").where_eq("a", 1)).unwrap();
        assert_eq!(
            render(&stmt),
            "select count(*) as aggregate from \"t\" where \"a\" = 1"
        );
    }

    #[test]
    fn test_compiled_dml_parses() {
        let g = grammar();
        let sqls = vec![
            render(&g.compile_select(&Query::table("t").where_eq("a", "x").limit(5)).unwrap()),
            render(&g.compile_count(&Query::table("t")).unwrap()),
            render(&g.compile_insert(
                &Query::table("t"),
                vec![
                    Record::new().with("a", 1).with("b", "x"),
                    Record::new().with("a", 2).with("b", "y"),
                ],
            )),
        ];
        for sql in sqls {
            let parsed = Parser::parse_sql(&ClickHouseDialect {}, &sql);
            assert!(parsed.is_ok(), "{} -> {:?}", sql, parsed.err());
        }
    }
}

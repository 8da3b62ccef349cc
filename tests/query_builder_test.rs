//! SQL rendering tests; no database connection is opened.

use relmap::db::Session;
use relmap::{Config, Database, Dialect, OrmError, QueryBuilder, Value, table_info};

#[derive(Debug, Default, Clone)]
struct Order {
    id: i64,
    user_id: i64,
    total: f64,
    status: String,
}

relmap::model!(Order => "orders" {
    id: "id,primary,auto_increment",
    user_id: "user_id,not_null,index",
    total: "total",
    status: "status,size:20,default:'new'",
});

fn builder(dialect: Dialect, table: &str) -> QueryBuilder<'static> {
    QueryBuilder::new(Session::Detached(dialect), table)
}

#[test]
fn test_where_in_limit_mysql() {
    // unconnected handles still render SQL
    let db = Database::new(Config::sqlite_memory());

    let (sql, args) = builder(Dialect::MySql, "users")
        .where_("age > ?", [18])
        .where_in("role", ["admin", "user"])
        .limit(5)
        .to_sql()
        .unwrap();
    assert!(sql.ends_with("WHERE age > ? AND role IN (?, ?) LIMIT 5"));
    assert_eq!(
        args,
        vec![Value::Int(18), Value::from("admin"), Value::from("user")]
    );

    let (sql, _) = db.table("users").where_("age > ?", [18]).to_sql().unwrap();
    assert_eq!(sql, "SELECT * FROM `users` WHERE age > ?");
}

#[test]
fn test_same_chain_across_dialects() {
    let chain = |dialect| {
        builder(dialect, "users")
            .select(["id", "name"])
            .where_("age > ?", [18])
            .where_not_null("email")
            .order_by("id")
            .limit(10)
            .offset(5)
            .to_sql()
            .unwrap()
            .0
    };

    assert_eq!(
        chain(Dialect::MySql),
        "SELECT id, name FROM `users` WHERE age > ? AND email IS NOT NULL ORDER BY id LIMIT 10 OFFSET 5"
    );
    assert_eq!(
        chain(Dialect::Postgres),
        "SELECT id, name FROM \"users\" WHERE age > $1 AND email IS NOT NULL ORDER BY id LIMIT 10 OFFSET 5"
    );
    assert_eq!(
        chain(Dialect::Sqlite),
        "SELECT id, name FROM `users` WHERE age > ? AND email IS NOT NULL ORDER BY id LIMIT 10 OFFSET 5"
    );
    assert_eq!(
        chain(Dialect::SqlServer),
        "SELECT id, name FROM [users] WHERE age > @P1 AND email IS NOT NULL ORDER BY id OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn test_placeholders_skip_quoted_text() {
    let (sql, args) = builder(Dialect::Postgres, "notes")
        .where_("body <> '?' AND author = ?", ["kim"])
        .where_in("tag", ["a", "b"])
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM \"notes\" WHERE body <> '?' AND author = $1 AND tag IN ($2, $3)"
    );
    assert_eq!(args.len(), 3);
}

#[test]
fn test_model_builder_uses_mapped_table() {
    let db = Database::new(Config::sqlite_memory());
    let (sql, _) = db
        .model::<Order>()
        .unwrap()
        .where_("status = ?", ["paid"])
        .to_sql()
        .unwrap();
    assert_eq!(sql, "SELECT * FROM `orders` WHERE status = ?");
}

#[test]
fn test_join_group_having_argument_order() {
    let (sql, args) = builder(Dialect::Postgres, "users u")
        .select(["u.id", "SUM(o.total) AS spent"])
        .join("orders o", "o.user_id = u.id")
        .right_join("regions r", "r.id = u.region_id")
        .where_("o.status = ?", ["paid"])
        .group_by("u.id")
        .having("SUM(o.total) > ?", [100.0])
        .order_by_desc("spent")
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT u.id, SUM(o.total) AS spent FROM users u JOIN orders o ON o.user_id = u.id \
         RIGHT JOIN regions r ON r.id = u.region_id WHERE o.status = $1 GROUP BY u.id \
         HAVING SUM(o.total) > $2 ORDER BY spent DESC"
    );
    assert_eq!(args, vec![Value::from("paid"), Value::Float(100.0)]);
}

#[test]
fn test_from_replaces_table() {
    let (sql, _) = builder(Dialect::MySql, "a").from("b").to_sql().unwrap();
    assert_eq!(sql, "SELECT * FROM `b`");

    let err = builder(Dialect::MySql, "").to_sql().unwrap_err();
    assert!(matches!(err, OrmError::Validation { .. }));
}

#[test]
fn test_create_table_mysql() {
    let info = table_info::<Order>(Dialect::MySql).unwrap();
    let sql = Dialect::MySql
        .create_table_sql(&info.name, &info.create_definitions())
        .unwrap();
    assert_eq!(
        sql,
        "CREATE TABLE `orders` (`id` BIGINT NOT NULL AUTO_INCREMENT, `user_id` BIGINT NOT NULL, \
         `total` DOUBLE, `status` VARCHAR(20) DEFAULT 'new', PRIMARY KEY (`id`))"
    );

    let indexes = info.index_definitions();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].name, "idx_orders_user_id");
}

#[test]
fn test_sqlite_inline_primary_key() {
    let info = table_info::<Order>(Dialect::Sqlite).unwrap();
    let sql = Dialect::Sqlite
        .create_table_sql(&info.name, &info.create_definitions())
        .unwrap();
    assert!(sql.starts_with("CREATE TABLE `orders` (`id` INTEGER PRIMARY KEY AUTOINCREMENT"));
    assert!(!sql.contains("PRIMARY KEY (`id`)"));
}

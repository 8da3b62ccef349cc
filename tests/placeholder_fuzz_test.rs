//! Randomized clause chains: the rendered statement must always carry one
//! placeholder per argument, numbered in order.

use rand::Rng;
use rand::distributions::Alphanumeric;
use relmap::db::Session;
use relmap::{Dialect, QueryBuilder, Value};

const ITERATIONS: usize = 500;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn random_values(rng: &mut impl Rng, max: usize) -> Vec<Value> {
    let n = rng.gen_range(0..=max);
    (0..n)
        .map(|_| match rng.gen_range(0..4) {
            0 => Value::Int(rng.gen_range(-1000..1000)),
            1 => Value::Text(random_string(rng.gen_range(0..12))),
            2 => Value::Bool(rng.gen_bool(0.5)),
            _ => Value::Null,
        })
        .collect()
}

/// Build a random chain, returning it with the expected argument list.
fn random_chain(dialect: Dialect, rng: &mut impl Rng) -> (QueryBuilder<'static>, Vec<Value>) {
    let mut builder = QueryBuilder::new(Session::Detached(dialect), "items");
    let mut where_args = Vec::new();
    let mut having_args = Vec::new();

    for _ in 0..rng.gen_range(0..8) {
        builder = match rng.gen_range(0..8) {
            0 => {
                let args = random_values(rng, 3);
                let expr = vec!["c = ?"; args.len()].join(" OR ");
                let expr = if expr.is_empty() { "1 = 1".to_string() } else { format!("({})", expr) };
                where_args.extend(args.iter().cloned());
                builder.where_(&expr, args)
            }
            1 => {
                let args = random_values(rng, 5);
                where_args.extend(args.iter().cloned());
                builder.where_in("a", args)
            }
            2 => {
                let args = random_values(rng, 5);
                where_args.extend(args.iter().cloned());
                builder.where_not_in("b", args)
            }
            3 => {
                let low = rng.gen_range(0..50);
                let high = low + rng.gen_range(0..50);
                where_args.push(Value::Int(low));
                where_args.push(Value::Int(high));
                builder.where_between("n", low, high)
            }
            4 => builder.where_null("d"),
            5 => builder.where_not_null("e").order_by("e"),
            6 => {
                // quoted markers are literal text, not placeholders
                let text = random_string(4);
                where_args.push(Value::Text(text.clone()));
                builder.where_("f <> '?' AND g = ?", [text])
            }
            _ => {
                let args = random_values(rng, 2);
                let expr = if args.is_empty() {
                    "COUNT(*) > 0".to_string()
                } else {
                    vec!["SUM(n) > ?"; args.len()].join(" AND ")
                };
                having_args.extend(args.iter().cloned());
                builder.group_by("a").having(&expr, args)
            }
        };
    }

    if rng.gen_bool(0.5) {
        builder = builder.limit(rng.gen_range(1..100));
    }
    if rng.gen_bool(0.3) {
        builder = builder.offset(rng.gen_range(0..100));
    }

    where_args.extend(having_args);
    (builder, where_args)
}

fn count_outside_quotes(sql: &str, marker: char) -> usize {
    let mut in_quote = false;
    sql.chars()
        .filter(|c| {
            if *c == '\'' {
                in_quote = !in_quote;
            }
            !in_quote && *c == marker
        })
        .count()
}

#[test]
fn fuzz_question_mark_dialects() {
    let mut rng = rand::thread_rng();
    for dialect in [Dialect::MySql, Dialect::Sqlite] {
        for _ in 0..ITERATIONS {
            let (builder, expected) = random_chain(dialect, &mut rng);
            let (sql, args) = builder.to_sql().unwrap();
            assert_eq!(args, expected, "argument order for {}", sql);
            assert_eq!(count_outside_quotes(&sql, '?'), args.len(), "{}", sql);
        }
    }
}

#[test]
fn fuzz_numbered_dialects() {
    let mut rng = rand::thread_rng();
    for (dialect, prefix) in [(Dialect::Postgres, "$"), (Dialect::SqlServer, "@P")] {
        for _ in 0..ITERATIONS {
            let (builder, expected) = random_chain(dialect, &mut rng);
            let (sql, args) = builder.to_sql().unwrap();
            assert_eq!(args, expected, "argument order for {}", sql);
            assert_eq!(count_outside_quotes(&sql, '?'), 0, "{}", sql);

            for n in 1..=args.len() {
                let placeholder = format!("{}{}", prefix, n);
                assert!(sql.contains(&placeholder), "missing {} in {}", placeholder, sql);
            }
            let next = format!("{}{} ", prefix, args.len() + 1);
            assert!(!sql.contains(&next), "extra {} in {}", next, sql);
        }
    }
}

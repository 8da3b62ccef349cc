//! Declarative macros for record types and argument lists.

/// Implement [`Model`](crate::mapping::Model) for a struct.
///
/// Each listed field gets a tag (see [`mapping::tag`](crate::mapping::tag)).
/// Field kinds are inferred from the field types, which must implement
/// [`SqlField`](crate::models::value::SqlField). Fields not listed are not
/// mapped. An optional `=> "table"` overrides the table name.
///
/// ```ignore
/// #[derive(Debug, Default, Clone)]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
///
/// relmap::model!(User => "users" {
///     id: "id,primary,auto_increment",
///     name: "name,not_null,size:100",
///     email: ",unique",
/// });
/// ```
#[macro_export]
macro_rules! model {
    ($ty:ty $(=> $table:literal)? { $($field:ident : $tag:literal),* $(,)? }) => {
        impl $crate::mapping::Model for $ty {
            fn fields() -> ::std::vec::Vec<$crate::mapping::FieldDef> {
                ::std::vec![
                    $(
                        $crate::mapping::FieldDef::of(
                            stringify!($field),
                            $tag,
                            |record: &$ty| &record.$field,
                        ),
                    )*
                ]
            }

            $(
                fn table_name() -> ::std::option::Option<&'static str> {
                    ::std::option::Option::Some($table)
                }
            )?

            fn field_value(&self, field: &str) -> $crate::models::value::Value {
                match field {
                    $(
                        stringify!($field) => $crate::models::value::Value::from(
                            ::std::clone::Clone::clone(&self.$field),
                        ),
                    )*
                    _ => $crate::models::value::Value::Null,
                }
            }

            fn set_field(
                &mut self,
                field: &str,
                value: $crate::models::value::Value,
            ) -> $crate::error::OrmResult<()> {
                match field {
                    $(
                        stringify!($field) => {
                            self.$field = $crate::models::value::FromValue::from_value(value)?;
                            ::std::result::Result::Ok(())
                        }
                    )*
                    _ => ::std::result::Result::Err($crate::error::OrmError::mapping(
                        ::std::format!("unknown field '{}'", field),
                        ::std::any::type_name::<Self>(),
                    )),
                }
            }
        }
    };
}

/// Build a `Vec<Value>` from mixed argument types.
///
/// ```ignore
/// let args = relmap::values![18, "admin", None::<i64>];
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::models::value::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::models::value::Value::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use crate::mapping::Model;
    use crate::models::schema::FieldKind;
    use crate::models::value::Value;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Sample {
        id: i64,
        label: Option<String>,
    }

    crate::model!(Sample => "samples" {
        id: "id,primary",
        label: "",
    });

    #[test]
    fn test_model_macro_fields() {
        let fields = Sample::fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].kind, FieldKind::BigInt);
        assert!(fields[1].nullable);
        assert_eq!(Sample::table_name(), Some("samples"));
    }

    #[test]
    fn test_model_macro_accessors() {
        let mut sample = Sample::default();
        sample.set_field("id", Value::Int(4)).unwrap();
        sample.set_field("label", Value::Text("x".into())).unwrap();
        assert_eq!(sample.field_value("id"), Value::Int(4));
        assert_eq!(sample.label.as_deref(), Some("x"));

        assert!(sample.set_field("nope", Value::Null).is_err());
        assert_eq!(sample.field_value("nope"), Value::Null);
    }

    #[test]
    fn test_values_macro() {
        let args = crate::values![1, "a", None::<i64>, true];
        assert_eq!(
            args,
            vec![
                Value::Int(1),
                Value::Text("a".into()),
                Value::Null,
                Value::Bool(true)
            ]
        );
        assert!(crate::values![].is_empty());
    }
}

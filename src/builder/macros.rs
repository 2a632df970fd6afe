//! Macros for building param maps.

/// Build a [`QueryParams`](crate::core::QueryParams) map.
///
/// Values go through [`QueryValue::from`](crate::core::QueryValue), so
/// strings, numbers, booleans and lists all work.
///
/// # Example
///
/// ```
/// use waypost::core::QueryValue;
/// use waypost::query_params;
///
/// let params = query_params! { "sort" => "asc", "page" => 2, "tags" => ["a", "b"] };
/// assert_eq!(params["page"], QueryValue::from("2"));
/// assert_eq!(params["tags"].as_list(), Some(&["a".to_string(), "b".to_string()][..]));
/// assert!(query_params! {}.is_empty());
/// ```
#[macro_export]
macro_rules! query_params {
    () => {
        $crate::core::QueryParams::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::core::QueryParams::new();
        $(
            params.insert(
                ::std::string::ToString::to_string(&$key),
                $crate::core::QueryValue::from($value),
            );
        )+
        params
    }};
}

/// Build a [`Params`](crate::core::Params) map. Values are stringified.
///
/// # Example
///
/// ```
/// use waypost::params;
///
/// let params = params! { "post_id" => 7, "slug" => "hello" };
/// assert_eq!(params["post_id"], "7");
/// ```
#[macro_export]
macro_rules! params {
    () => {
        $crate::core::Params::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::core::Params::new();
        $(
            params.insert(
                ::std::string::ToString::to_string(&$key),
                ::std::string::ToString::to_string(&$value),
            );
        )+
        params
    }};
}

#[cfg(test)]
mod tests {
    use crate::core::{Params, QueryParams, QueryValue};

    #[test]
    fn query_params_macro_converts_values() {
        let params = query_params! { "flag" => true, "n" => 3, "list" => vec!["x"] };
        assert_eq!(params["flag"], QueryValue::Single("true".into()));
        assert_eq!(params["n"], QueryValue::Single("3".into()));
        assert_eq!(params["list"], QueryValue::List(vec!["x".into()]));
    }

    #[test]
    fn macros_support_empty_form() {
        let empty: QueryParams = query_params! {};
        let none: Params = params! {};
        assert!(empty.is_empty());
        assert!(none.is_empty());
    }

    #[test]
    fn params_macro_stringifies() {
        let params = params! { "id" => 5, "name" => "x", };
        assert_eq!(params.len(), 2);
        assert_eq!(params["id"], "5");
    }
}

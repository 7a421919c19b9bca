/// Builds TDN values with JSON-like syntax.
///
/// `tdn!(...)` returns a fresh [`Document`](crate::Document) whose root is the
/// described value. `tdn!(in doc; ...)` allocates into an existing document
/// and returns the [`Value`](crate::Value), which is how shared containers are
/// put together: a parenthesized expression is inserted as-is, so a cloned
/// container handle is the same container in both places.
///
/// `null` is a `null.Symbol`. Any other expression goes through
/// `Value::from`; wrap negative numbers and method calls in parentheses.
///
/// # Examples
///
/// ```rust
/// use serde_tdn::{tdn, Document};
///
/// let doc = tdn!({"name": "Alice", "tags": ["a", "b"], "age": 30});
/// let root = doc.root_node();
/// assert_eq!(root.get("age").unwrap().value().as_i64(), Some(30));
///
/// let mut doc = Document::new();
/// let shared = tdn!(in doc; [1, 2]);
/// let root = tdn!(in doc; {"left": (shared.clone()), "right": (shared.clone())});
/// doc.set_root(root);
/// let root = doc.root_node();
/// assert!(root.get("left").unwrap().same_instance(&root.get("right").unwrap()));
/// ```
#[macro_export]
macro_rules! tdn {
    (@value $doc:ident, null) => {
        $crate::Value::null($crate::TypeTag::Symbol)
    };

    (@value $doc:ident, [ $($elem:tt),* $(,)? ]) => {{
        let items = vec![$($crate::tdn!(@value $doc, $elem)),*];
        $doc.sequence_from(items)
    }};

    (@value $doc:ident, { $($key:literal : $value:tt),* $(,)? }) => {{
        #[allow(unused_mut)]
        let mut properties: Vec<(&str, $crate::Value)> = Vec::new();
        $(
            properties.push(($key, $crate::tdn!(@value $doc, $value)));
        )*
        $doc.record_from(properties)
    }};

    (@value $doc:ident, $other:expr) => {
        $crate::Value::from($other)
    };

    (in $doc:ident; $($tt:tt)+) => {
        $crate::tdn!(@value $doc, $($tt)+)
    };

    ($($tt:tt)+) => {{
        let mut document = $crate::Document::new();
        let root = $crate::tdn!(@value document, $($tt)+);
        document.set_root(root);
        document
    }};
}

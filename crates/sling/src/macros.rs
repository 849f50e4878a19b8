// Raise macros
// Shorthand for raising values with messages and binding snapshots

/// Snapshot named local variables into [`Bindings`](crate::Bindings).
///
/// Each value is cloned and must be `Debug + Send + Sync + 'static`.
#[macro_export]
macro_rules! bindings {
    ($($name:ident),* $(,)?) => {
        $crate::Bindings::new()$(.with(stringify!($name), ::std::clone::Clone::clone(&$name)))*
    };
}

/// Raise a value through the active throw hook.
///
/// ```ignore
/// raise!(json!({"code": 404}))?;
/// raise!(json!({"code": 404}), "user {} not found", id)?;
/// raise!(json!({"code": 404}); id, attempts)?;
/// ```
#[macro_export]
macro_rules! raise {
    ($object:expr; $($name:ident),+ $(,)?) => {
        $crate::Raise::value($object)
            .bindings($crate::bindings!($($name),+))
            .raise()
    };
    ($object:expr, $($fmt:tt)+) => {
        $crate::Raise::value($object)
            .message(format!($($fmt)+))
            .raise()
    };
    ($object:expr) => {
        $crate::Raise::value($object).raise()
    };
}

/// Return early with a raised value if a condition is not satisfied
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $object:expr $(, $($fmt:tt)+)?) => {
        if !($cond) {
            return $crate::raise!($object $(, $($fmt)+)?);
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{Carrier, Raised};

    fn checked_div(a: i32, b: i32) -> Result<i32, Raised> {
        ensure!(b != 0, "division by zero");
        Ok(a / b)
    }

    #[test]
    fn test_bindings_macro() {
        let user = "ada".to_string();
        let attempts = 3u8;
        let bindings = bindings!(user, attempts);
        assert_eq!(bindings.value::<String>("user").unwrap(), "ada");
        assert_eq!(bindings.value::<u8>("attempts"), Some(&3));
    }

    #[test]
    fn test_raise_macro_with_message() {
        let id = 7;
        let result: Result<(), Raised> = raise!(404u16, "user {} not found", id);
        let err = result.unwrap_err();
        let carrier = err.downcast_ref::<Carrier>().unwrap();
        assert_eq!(carrier.message(), "user 7 not found: 404");
    }

    #[test]
    fn test_raise_macro_with_bindings() {
        let id = 7u32;
        let result: Result<(), Raised> = raise!("missing"; id);
        let err = result.unwrap_err();
        let carrier = err.downcast_ref::<Carrier>().unwrap();
        assert_eq!(carrier.bindings().unwrap().value::<u32>("id"), Some(&7));
    }

    #[test]
    fn test_ensure_macro() {
        assert_eq!(checked_div(6, 3).unwrap(), 2);
        let err = checked_div(1, 0).unwrap_err();
        let carrier = err.downcast_ref::<Carrier>().unwrap();
        assert_eq!(carrier.object().downcast_ref::<&str>(), Some(&"division by zero"));
    }
}

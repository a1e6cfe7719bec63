///
/// User-defined SQL functions.
///
/// Scalar functions are plain closures over `&[Value]`; aggregates implement
/// `Aggregate`. Either is boxed and handed to `sqlite3_create_function_v2`
/// as user data, with a destructor the engine calls when the function is
/// replaced or the connection closes.
///
/// Callbacks never unwind into the engine: a panic or an `Err` is reported
/// to SQLite as the function's error result.
///

use std::ffi::{c_int, c_void, CString};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use rusqlite::ffi;

use crate::errors::{Error, Result};
use crate::value::Value;

/// An aggregate SQL function such as `sum()` or `group_concat()`.
///
/// A fresh state is created with `init` for every group, fed once per row
/// through `step`, and consumed by `finalize`. `finalize` receives `None`
/// when the group was empty.
pub trait Aggregate: Send + 'static {
    type State;

    fn init(&self) -> Self::State;

    fn step(&self, state: &mut Self::State, args: &[Value]) -> Result<()>;

    fn finalize(&self, state: Option<Self::State>) -> Result<Value>;
}

fn function_flags(deterministic: bool) -> c_int {
    if deterministic {
        ffi::SQLITE_UTF8 | ffi::SQLITE_DETERMINISTIC
    } else {
        ffi::SQLITE_UTF8
    }
}

pub(crate) fn create_scalar<F>(
    db: *mut ffi::sqlite3,
    name: &str,
    n_args: i32,
    deterministic: bool,
    function: F,
) -> Result<()>
where
    F: Fn(&[Value]) -> Result<Value> + Send + 'static,
{
    let c_name = CString::new(name)?;
    let data = Box::into_raw(Box::new(function)).cast::<c_void>();
    // On failure the engine runs the destructor itself.
    let rc = unsafe {
        ffi::sqlite3_create_function_v2(
            db,
            c_name.as_ptr(),
            n_args,
            function_flags(deterministic),
            data,
            Some(scalar_callback::<F>),
            None,
            None,
            Some(destroy::<F>),
        )
    };
    if rc != ffi::SQLITE_OK {
        return Err(Error::from_connection(db, rc));
    }
    tracing::debug!(name, n_args, deterministic, "registered scalar function");
    Ok(())
}

pub(crate) fn create_aggregate<A: Aggregate>(
    db: *mut ffi::sqlite3,
    name: &str,
    n_args: i32,
    deterministic: bool,
    aggregate: A,
) -> Result<()> {
    let c_name = CString::new(name)?;
    let data = Box::into_raw(Box::new(aggregate)).cast::<c_void>();
    let rc = unsafe {
        ffi::sqlite3_create_function_v2(
            db,
            c_name.as_ptr(),
            n_args,
            function_flags(deterministic),
            data,
            None,
            Some(aggregate_step::<A>),
            Some(aggregate_final::<A>),
            Some(destroy::<A>),
        )
    };
    if rc != ffi::SQLITE_OK {
        return Err(Error::from_connection(db, rc));
    }
    tracing::debug!(name, n_args, deterministic, "registered aggregate function");
    Ok(())
}

unsafe extern "C" fn destroy<T>(data: *mut c_void) {
    drop(unsafe { Box::from_raw(data.cast::<T>()) });
}

unsafe extern "C" fn scalar_callback<F>(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) where
    F: Fn(&[Value]) -> Result<Value>,
{
    let function = unsafe { &*ffi::sqlite3_user_data(ctx).cast::<F>() };
    let args = unsafe { read_args(argc, argv) };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| function(&args)));
    unsafe { report(ctx, outcome) };
}

unsafe extern "C" fn aggregate_step<A: Aggregate>(
    ctx: *mut ffi::sqlite3_context,
    argc: c_int,
    argv: *mut *mut ffi::sqlite3_value,
) {
    let aggregate = unsafe { &*ffi::sqlite3_user_data(ctx).cast::<A>() };
    let slot = unsafe {
        ffi::sqlite3_aggregate_context(ctx, mem::size_of::<*mut A::State>() as c_int)
            .cast::<*mut A::State>()
    };
    if slot.is_null() {
        unsafe { ffi::sqlite3_result_error_nomem(ctx) };
        return;
    }
    let args = unsafe { read_args(argc, argv) };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
        if (*slot).is_null() {
            *slot = Box::into_raw(Box::new(aggregate.init()));
        }
        aggregate.step(&mut **slot, &args)
    }));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => unsafe { report_error(ctx, &err) },
        Err(_) => unsafe { report_panic(ctx) },
    }
}

unsafe extern "C" fn aggregate_final<A: Aggregate>(ctx: *mut ffi::sqlite3_context) {
    let aggregate = unsafe { &*ffi::sqlite3_user_data(ctx).cast::<A>() };
    // A zero size does not allocate, so an empty group yields a null slot.
    let slot = unsafe { ffi::sqlite3_aggregate_context(ctx, 0).cast::<*mut A::State>() };
    let state = unsafe {
        if slot.is_null() || (*slot).is_null() {
            None
        } else {
            let state = Box::from_raw(*slot);
            *slot = ptr::null_mut();
            Some(*state)
        }
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| aggregate.finalize(state)));
    unsafe { report(ctx, outcome) };
}

unsafe fn read_args(argc: c_int, argv: *mut *mut ffi::sqlite3_value) -> Vec<Value> {
    (0..argc.max(0) as usize)
        .map(|i| unsafe { read_value(*argv.add(i)) })
        .collect()
}

unsafe fn read_value(value: *mut ffi::sqlite3_value) -> Value {
    unsafe {
        match ffi::sqlite3_value_type(value) {
            ffi::SQLITE_INTEGER => Value::Integer(ffi::sqlite3_value_int64(value)),
            ffi::SQLITE_FLOAT => Value::Real(ffi::sqlite3_value_double(value)),
            ffi::SQLITE_TEXT => {
                let text = ffi::sqlite3_value_text(value);
                let len = ffi::sqlite3_value_bytes(value).max(0) as usize;
                if text.is_null() {
                    Value::Text(String::new())
                } else {
                    let bytes = std::slice::from_raw_parts(text, len);
                    Value::Text(String::from_utf8_lossy(bytes).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let blob = ffi::sqlite3_value_blob(value);
                let len = ffi::sqlite3_value_bytes(value).max(0) as usize;
                if blob.is_null() || len == 0 {
                    Value::Blob(Vec::new())
                } else {
                    Value::Blob(std::slice::from_raw_parts(blob.cast::<u8>(), len).to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

unsafe fn report(ctx: *mut ffi::sqlite3_context, outcome: std::thread::Result<Result<Value>>) {
    unsafe {
        match outcome {
            Ok(Ok(value)) => set_result(ctx, &value),
            Ok(Err(err)) => report_error(ctx, &err),
            Err(_) => report_panic(ctx),
        }
    }
}

unsafe fn set_result(ctx: *mut ffi::sqlite3_context, value: &Value) {
    unsafe {
        match value {
            Value::Null => ffi::sqlite3_result_null(ctx),
            Value::Integer(i) => ffi::sqlite3_result_int64(ctx, *i),
            Value::Real(f) => ffi::sqlite3_result_double(ctx, *f),
            Value::Text(s) => ffi::sqlite3_result_text64(
                ctx,
                s.as_ptr().cast(),
                s.len() as ffi::sqlite3_uint64,
                ffi::SQLITE_TRANSIENT(),
                ffi::SQLITE_UTF8 as u8,
            ),
            Value::Blob(b) if b.is_empty() => ffi::sqlite3_result_zeroblob(ctx, 0),
            Value::Blob(b) => ffi::sqlite3_result_blob64(
                ctx,
                b.as_ptr().cast(),
                b.len() as ffi::sqlite3_uint64,
                ffi::SQLITE_TRANSIENT(),
            ),
        }
    }
}

unsafe fn report_error(ctx: *mut ffi::sqlite3_context, err: &Error) {
    let message = err.to_string();
    unsafe {
        ffi::sqlite3_result_error(ctx, message.as_ptr().cast(), message.len() as c_int);
        if err.is_native() {
            ffi::sqlite3_result_error_code(ctx, err.code());
        }
    }
}

unsafe fn report_panic(ctx: *mut ffi::sqlite3_context) {
    const MESSAGE: &str = "SQL function panicked";
    unsafe {
        ffi::sqlite3_result_error(ctx, MESSAGE.as_ptr().cast(), MESSAGE.len() as c_int);
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, Error, Result, Statement, Value};

    use super::Aggregate;

    struct Concat;

    impl Aggregate for Concat {
        type State = Vec<String>;

        fn init(&self) -> Self::State {
            Vec::new()
        }

        fn step(&self, state: &mut Self::State, args: &[Value]) -> Result<()> {
            match &args[0] {
                Value::Text(s) => state.push(s.clone()),
                Value::Null => {}
                other => return Err(Error::new(format!("concat() expects text, got {}", other.column_type()))),
            }
            Ok(())
        }

        fn finalize(&self, state: Option<Self::State>) -> Result<Value> {
            Ok(state.map_or(Value::Null, |parts| Value::Text(parts.join("+"))))
        }
    }

    #[test]
    fn test_scalar_function() {
        let db = Database::open_in_memory().unwrap();
        db.create_function("half", 1, true, |args| {
            Ok(args[0].as_f64().map_or(Value::Null, |v| Value::Real(v / 2.0)))
        })
        .unwrap();
        assert_eq!(db.exec_and_get("SELECT half(5)").unwrap().get_double().unwrap(), 2.5);
        assert!(db.exec_and_get("SELECT half(NULL)").unwrap().is_null().unwrap());
    }

    #[test]
    fn test_scalar_function_round_trips_values() {
        let db = Database::open_in_memory().unwrap();
        db.create_function("echo", -1, false, |args| Ok(args.last().cloned().unwrap_or(Value::Null)))
            .unwrap();
        let mut query = Statement::new(&db, "SELECT echo(), echo(1, 'text'), echo(x'00ff'), echo(zeroblob(0))").unwrap();
        assert!(query.execute_step().unwrap());
        assert!(query.is_column_null(0).unwrap());
        assert_eq!(query.get::<String>(1).unwrap(), "text");
        assert_eq!(query.get::<Vec<u8>>(2).unwrap(), vec![0x00, 0xff]);
        assert!(query.get_column(3).unwrap().is_blob().unwrap());
    }

    #[test]
    fn test_function_error_and_panic() {
        let db = Database::open_in_memory().unwrap();
        db.create_function("fail", 0, false, |_| Err(Error::new("nope"))).unwrap();
        db.create_function("boom", 0, false, |_| -> Result<Value> { panic!("boom") }).unwrap();

        let err = db.exec_and_get("SELECT fail()").unwrap_err();
        assert_eq!(err.to_string(), "nope");
        let err = db.exec_and_get("SELECT boom()").unwrap_err();
        assert_eq!(err.to_string(), "SQL function panicked");
        assert_eq!(db.exec_and_get("SELECT 3").unwrap().get_int().unwrap(), 3);
    }

    #[test]
    fn test_aggregate_function() {
        let db = Database::open_in_memory().unwrap();
        db.exec(
            "CREATE TABLE words (grp INTEGER, word TEXT);
             INSERT INTO words VALUES (1, 'a'), (1, 'b'), (2, 'c'), (2, NULL);",
        )
        .unwrap();
        db.create_aggregate("concat", 1, true, Concat).unwrap();

        let mut query = Statement::new(&db, "SELECT grp, concat(word) FROM words GROUP BY grp ORDER BY grp").unwrap();
        let groups: Vec<(i32, String)> = query
            .rows()
            .map(|row| row.and_then(|r| r.get_columns()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(groups, vec![(1, "a+b".to_string()), (2, "c".to_string())]);

        db.exec("DELETE FROM words").unwrap();
        assert!(db.exec_and_get("SELECT concat(word) FROM words").unwrap().is_null().unwrap());
    }

    #[test]
    fn test_aggregate_step_error() {
        let db = Database::open_in_memory().unwrap();
        db.create_aggregate("concat", 1, false, Concat).unwrap();
        let err = db.exec_and_get("SELECT concat(v) FROM (SELECT 1 AS v)").unwrap_err();
        assert_eq!(err.to_string(), "concat() expects text, got INTEGER");
    }

    #[test]
    fn test_invalid_function_name() {
        let db = Database::open_in_memory().unwrap();
        let err = db.create_function("bad\0name", 0, false, |_| Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, Error::Nul(_)));
    }
}

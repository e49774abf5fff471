use std::io::BufRead;

use crate::lang::object::{Builtin, Object, RuntimeError, STRING};

// =============================================================================
// BUILTINS - Host functions exposed to guest programs
// =============================================================================

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "read_line",
        func: builtin_read_line,
    },
    Builtin {
        name: "read_file",
        func: builtin_read_file,
    },
];

pub fn lookup(name: &str) -> Option<Builtin> {
    BUILTINS.iter().find(|builtin| builtin.name == name).copied()
}

fn expect_one_argument(args: &[Object]) -> Option<Object> {
    if args.len() != 1 {
        return Some(Object::Error(RuntimeError::ArgumentNumberMismatch {
            expected: 1,
            actual: args.len(),
        }));
    }
    None
}

fn builtin_len(args: Vec<Object>) -> Object {
    if let Some(error) = expect_one_argument(&args) {
        return error;
    }

    match &args[0] {
        Object::Str(value) => Object::Integer(value.chars().count() as i64),
        other => Object::Error(RuntimeError::ArgumentMismatch {
            expected: STRING,
            actual: other.type_name(),
        }),
    }
}

/// With no argument, read one line from stdin; with a filename, read that
/// file's first line. Null when there is no line to read.
fn builtin_read_line(args: Vec<Object>) -> Object {
    match args.as_slice() {
        [] => {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) => Object::Null,
                Ok(_) => Object::Str(line.trim_end_matches(['\n', '\r']).to_string()),
                Err(err) => Object::Error(RuntimeError::Io(err.to_string())),
            }
        }
        [Object::Str(path)] => match std::fs::read_to_string(path) {
            Ok(contents) => match contents.lines().next() {
                Some(line) => Object::Str(line.to_string()),
                None => Object::Null,
            },
            Err(err) => Object::Error(RuntimeError::Io(err.to_string())),
        },
        [other] => Object::Error(RuntimeError::ArgumentMismatch {
            expected: STRING,
            actual: other.type_name(),
        }),
        _ => Object::Error(RuntimeError::ArgumentNumberMismatch {
            expected: 1,
            actual: args.len(),
        }),
    }
}

fn builtin_read_file(args: Vec<Object>) -> Object {
    if let Some(error) = expect_one_argument(&args) {
        return error;
    }

    let path = match &args[0] {
        Object::Str(value) => value,
        other => {
            return Object::Error(RuntimeError::ArgumentMismatch {
                expected: STRING,
                actual: other.type_name(),
            });
        }
    };

    match std::fs::read_to_string(path) {
        Ok(contents) => Object::Str(contents),
        Err(err) => Object::Error(RuntimeError::Io(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::object::INTEGER;

    #[test]
    fn test_lookup() {
        assert!(lookup("len").is_some());
        assert!(lookup("read_file").is_some());
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_len() {
        assert_eq!(
            builtin_len(vec![Object::Str("cinder".to_string())]),
            Object::Integer(6)
        );
        assert_eq!(
            builtin_len(vec![Object::Str(String::new())]),
            Object::Integer(0)
        );
    }

    #[test]
    fn test_len_rejects_wrong_argument_type() {
        assert_eq!(
            builtin_len(vec![Object::Integer(1)]),
            Object::Error(RuntimeError::ArgumentMismatch {
                expected: STRING,
                actual: INTEGER,
            })
        );
    }

    #[test]
    fn test_len_rejects_wrong_argument_count() {
        assert_eq!(
            builtin_len(vec![]),
            Object::Error(RuntimeError::ArgumentNumberMismatch {
                expected: 1,
                actual: 0,
            })
        );
    }

    #[test]
    fn test_read_line_from_file_returns_first_line() {
        let path = std::env::temp_dir().join(format!("cinder-read-line-{}.txt", std::process::id()));
        std::fs::write(&path, "first\nsecond\n").expect("write temp file");

        let result = builtin_read_line(vec![Object::Str(path.display().to_string())]);
        std::fs::remove_file(&path).expect("remove temp file");

        assert_eq!(result, Object::Str("first".to_string()));
    }

    #[test]
    fn test_read_line_from_empty_file_is_null() {
        let path = std::env::temp_dir().join(format!("cinder-read-empty-{}.txt", std::process::id()));
        std::fs::write(&path, "").expect("write temp file");

        let result = builtin_read_line(vec![Object::Str(path.display().to_string())]);
        std::fs::remove_file(&path).expect("remove temp file");

        assert_eq!(result, Object::Null);
    }

    #[test]
    fn test_read_line_argument_checks() {
        assert_eq!(
            builtin_read_line(vec![Object::Integer(1)]),
            Object::Error(RuntimeError::ArgumentMismatch {
                expected: STRING,
                actual: INTEGER,
            })
        );
        assert_eq!(
            builtin_read_line(vec![
                Object::Str("a".to_string()),
                Object::Str("b".to_string()),
            ]),
            Object::Error(RuntimeError::ArgumentNumberMismatch {
                expected: 1,
                actual: 2,
            })
        );
    }

    #[test]
    fn test_read_file_missing_path_is_an_io_error() {
        let result = builtin_read_file(vec![Object::Str(
            "/no/such/file/anywhere.cdr".to_string(),
        )]);
        assert!(matches!(result, Object::Error(RuntimeError::Io(_))));
    }
}

use serde::Serialize;

/// Location of a token in program text. `offset` counts characters from the
/// start of the program, `line` and `column` are zero-based and converted to
/// one-based form only when rendered for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Position {
            offset,
            line,
            column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_position_is_origin() {
        let p = Position::default();
        assert_eq!(p.offset, 0);
        assert_eq!(p.line, 0);
        assert_eq!(p.column, 0);
    }
}

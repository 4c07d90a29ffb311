pub type Result<T> = std::result::Result<T, SheetError>;

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("Row {row}: student name is blank")]
    BlankName { row: usize },

    #[error("Student '{name}' appears more than once (rows {first} and {second})")]
    DuplicateName {
        name: String,
        first: usize,
        second: usize,
    },

    #[error(transparent)]
    Fs(#[from] fsutil::Error),
}

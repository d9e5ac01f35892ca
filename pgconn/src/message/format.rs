/// Wire format code for a parameter or column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PgFormat {
    Text = 0,
    Binary = 1,
}

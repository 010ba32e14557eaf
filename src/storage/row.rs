use std::fmt;

pub const COLUMN_USERNAME_SIZE: usize = 32;
pub const COLUMN_EMAIL_SIZE: usize = 255;

pub const ID_SIZE: usize = 4;
pub const ID_OFFSET: usize = 0;
pub const USERNAME_OFFSET: usize = ID_OFFSET + ID_SIZE;
pub const EMAIL_OFFSET: usize = USERNAME_OFFSET + COLUMN_USERNAME_SIZE;
pub const ROW_SIZE: usize = ID_SIZE + COLUMN_USERNAME_SIZE + COLUMN_EMAIL_SIZE;

/// A single table row. Fixed-width on disk, owned strings in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    /// Write the row into a `ROW_SIZE` region: id (little-endian u32), then
    /// the text columns zero-padded to their fixed widths. The prepare layer
    /// rejects over-long strings before a row is ever built, so the fields
    /// always fit.
    pub fn serialize(&self, dest: &mut [u8]) {
        dest[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        write_padded(&mut dest[USERNAME_OFFSET..EMAIL_OFFSET], self.username.as_bytes());
        write_padded(&mut dest[EMAIL_OFFSET..ROW_SIZE], self.email.as_bytes());
    }

    /// Read a row back out of a `ROW_SIZE` region. Trailing zero padding is
    /// stripped from the text columns.
    pub fn deserialize(src: &[u8]) -> Row {
        let id = u32::from_le_bytes(src[ID_OFFSET..ID_OFFSET + ID_SIZE].try_into().unwrap());
        Row {
            id,
            username: read_padded(&src[USERNAME_OFFSET..EMAIL_OFFSET]),
            email: read_padded(&src[EMAIL_OFFSET..ROW_SIZE]),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username, self.email)
    }
}

fn write_padded(dest: &mut [u8], bytes: &[u8]) {
    dest[..bytes.len()].copy_from_slice(bytes);
    dest[bytes.len()..].fill(0);
}

fn read_padded(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

use std::ffi::CStr;

use crate::Result;

/// View of the `#Strings` heap: null-terminated UTF-8 identifiers addressed by byte offset.
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wraps a `#Strings` heap, which must begin with the empty string.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with `0`.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Returns the string starting at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an index past the heap and
    /// [`crate::Error::Malformed`] for an unterminated or non UTF-8 string.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => result
                .to_str()
                .map_err(|_| malformed_error!("Invalid string at index - {}", index)),
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let data = b"\0<Module>\0Foo\0Foo.Internal\0";
        let heap = Strings::from(data).unwrap();

        assert_eq!(heap.get(0).unwrap(), "");
        assert_eq!(heap.get(1).unwrap(), "<Module>");
        assert_eq!(heap.get(10).unwrap(), "Foo");
        assert_eq!(heap.get(14).unwrap(), "Foo.Internal");
        assert!(heap.get(data.len()).is_err());
    }

    #[test]
    fn invalid_heap() {
        assert!(Strings::from(b"").is_err());
        assert!(Strings::from(b"abc\0").is_err());
    }
}

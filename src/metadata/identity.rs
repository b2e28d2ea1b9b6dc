//! Assembly identities and references (ECMA-335 II.6.3, II.22.2, II.22.5).
//!
//! [`AssemblyIdentity`] describes the assembly a module defines, [`AssemblyReference`] one
//! entry of its `AssemblyRef` table. Both can print the usual display name
//! (`Name, Version=1.0.0.0, Culture=neutral, PublicKeyToken=...`), for which full public keys
//! are reduced to their token with [`Identity::to_token`].
//!
//! # Example
//! ```rust
//! use publicizer::metadata::identity::Identity;
//!
//! let id = Identity::from(&[0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89], false)?;
//! assert_eq!(id.to_token(0x8004)?, 0xb77a_5c56_1934_e089);
//! # Ok::<(), publicizer::Error>(())
//! ```

use std::fmt;

use md5::{Digest, Md5};
use sha1::Sha1;

use crate::{
    file::io::read_le,
    metadata::{
        streams::{Blob, Strings},
        tables::{AssemblyRaw, AssemblyRefRaw},
    },
    Error, Result,
};

/// All possible values for `AssemblyHashAlgorithm`
#[allow(non_snake_case)]
pub mod AssemblyHashAlgorithm {
    /// No hash algorithm specified
    pub const NONE: u32 = 0x0000;
    /// MD5 hash algorithm
    pub const MD5: u32 = 0x8003;
    /// SHA1 hash algorithm
    pub const SHA1: u32 = 0x8004;
}

/// `AssemblyFlags` (II.23.1.2)
#[allow(non_snake_case)]
pub mod AssemblyFlags {
    /// The blob holds the full public key rather than its token
    pub const PUBLIC_KEY: u32 = 0x0001;
    /// The referenced assembly may be retargeted at runtime
    pub const RETARGETABLE: u32 = 0x0100;
    /// Mask of the content type bits
    pub const CONTENT_TYPE_MASK: u32 = 0x0E00;
    /// Content type of a Windows Runtime assembly
    pub const CONTENT_TYPE_WINDOWS_RUNTIME: u32 = 0x0200;
}

/// A strong-name identity: either a full public key or its 8 byte token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The full RSA public key
    PubKey(Vec<u8>),
    /// The token, in display order
    Token(u64),
}

impl Identity {
    /// Creates an `Identity` from a public key or public key token blob.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a token blob is shorter than 8 bytes.
    pub fn from(data: &[u8], is_pub: bool) -> Result<Self> {
        Ok(if is_pub {
            Identity::PubKey(data.to_vec())
        } else {
            let bytes: [u8; 8] = data
                .get(..8)
                .and_then(|token| token.try_into().ok())
                .ok_or_else(|| out_of_bounds_error!())?;
            Identity::Token(u64::from_be_bytes(bytes))
        })
    }

    /// The token: the last 8 bytes of the hash of the public key, reversed.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for a hash algorithm other than MD5 and SHA1.
    pub fn to_token(&self, algo: u32) -> Result<u64> {
        match &self {
            Identity::PubKey(data) => match algo {
                AssemblyHashAlgorithm::MD5 => {
                    let result = Md5::digest(data);
                    read_le::<u64>(&result[result.len() - 8..])
                }
                AssemblyHashAlgorithm::SHA1 => {
                    let result = Sha1::digest(data);
                    read_le::<u64>(&result[result.len() - 8..])
                }
                _ => Err(Error::NotSupported),
            },
            Identity::Token(token) => Ok(*token),
        }
    }
}

/// Four-part assembly version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// Creates a version from its four parts.
    #[must_use]
    pub fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

fn write_display_name(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    version: AssemblyVersion,
    culture: Option<&str>,
    token: Option<u64>,
) -> fmt::Result {
    write!(
        f,
        "{name}, Version={version}, Culture={}, PublicKeyToken=",
        culture.unwrap_or("neutral")
    )?;
    match token {
        Some(token) => write!(f, "{token:016x}"),
        None => write!(f, "null"),
    }
}

fn optional_culture(strings: &Strings, index: u32) -> Result<Option<String>> {
    if index == 0 {
        return Ok(None);
    }
    let culture = strings.get(index as usize)?;
    Ok((!culture.is_empty()).then(|| culture.to_string()))
}

fn optional_identity(blobs: &Blob, index: u32, is_pub: bool) -> Result<Option<Identity>> {
    if index == 0 {
        return Ok(None);
    }
    let data = blobs.get(index as usize)?;
    if data.is_empty() {
        return Ok(None);
    }
    Identity::from(data, is_pub).map(Some)
}

/// The identity of the assembly a module defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyIdentity {
    /// Simple name
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Culture, `None` when neutral
    pub culture: Option<String>,
    /// Public key, `None` when not strong-named
    pub public_key: Option<Identity>,
    /// Hash algorithm used for the file hashes of the assembly
    pub hash_alg_id: u32,
    /// `AssemblyFlags`
    pub flags: u32,
}

impl AssemblyIdentity {
    /// Builds the identity from the row of the `Assembly` table.
    ///
    /// # Errors
    /// Returns an error if a heap index is out of range.
    pub fn from_raw(raw: &AssemblyRaw, strings: &Strings, blobs: &Blob) -> Result<Self> {
        Ok(AssemblyIdentity {
            name: strings.get(raw.name as usize)?.to_string(),
            version: AssemblyVersion::new(
                raw.major_version,
                raw.minor_version,
                raw.build_number,
                raw.revision_number,
            ),
            culture: optional_culture(strings, raw.culture)?,
            public_key: optional_identity(blobs, raw.public_key, true)?,
            hash_alg_id: raw.hash_alg_id,
            flags: raw.flags,
        })
    }

    /// The public key token, `None` if the assembly is not strong-named.
    #[must_use]
    pub fn public_key_token(&self) -> Option<u64> {
        self.public_key
            .as_ref()
            .and_then(|key| key.to_token(AssemblyHashAlgorithm::SHA1).ok())
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_display_name(
            f,
            &self.name,
            self.version,
            self.culture.as_deref(),
            self.public_key_token(),
        )
    }
}

/// One `AssemblyRef` row: a dependency the resolver must locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyReference {
    /// Simple name, also the file stem the resolver probes for
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Culture, `None` when neutral
    pub culture: Option<String>,
    /// Public key or token, `None` when not strong-named
    pub public_key_or_token: Option<Identity>,
    /// `AssemblyFlags`
    pub flags: u32,
}

impl AssemblyReference {
    /// Creates a reference to an assembly by name alone.
    #[must_use]
    pub fn new(name: &str) -> Self {
        AssemblyReference {
            name: name.to_string(),
            version: AssemblyVersion::default(),
            culture: None,
            public_key_or_token: None,
            flags: 0,
        }
    }

    /// Builds the reference from a row of the `AssemblyRef` table.
    ///
    /// # Errors
    /// Returns an error if a heap index is out of range.
    pub fn from_raw(raw: &AssemblyRefRaw, strings: &Strings, blobs: &Blob) -> Result<Self> {
        Ok(AssemblyReference {
            name: strings.get(raw.name as usize)?.to_string(),
            version: AssemblyVersion::new(
                raw.major_version,
                raw.minor_version,
                raw.build_number,
                raw.revision_number,
            ),
            culture: optional_culture(strings, raw.culture)?,
            public_key_or_token: optional_identity(
                blobs,
                raw.public_key_or_token,
                raw.flags & AssemblyFlags::PUBLIC_KEY != 0,
            )?,
            flags: raw.flags,
        })
    }

    /// `true` if the reference targets a Windows Runtime metadata file.
    #[must_use]
    pub fn is_windows_runtime(&self) -> bool {
        self.flags & AssemblyFlags::CONTENT_TYPE_MASK == AssemblyFlags::CONTENT_TYPE_WINDOWS_RUNTIME
    }

    /// The public key token, `None` if the reference is not strong-named.
    #[must_use]
    pub fn public_key_token(&self) -> Option<u64> {
        self.public_key_or_token
            .as_ref()
            .and_then(|key| key.to_token(AssemblyHashAlgorithm::SHA1).ok())
    }
}

impl fmt::Display for AssemblyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_display_name(
            f,
            &self.name,
            self.version,
            self.culture.as_deref(),
            self.public_key_token(),
        )
    }
}

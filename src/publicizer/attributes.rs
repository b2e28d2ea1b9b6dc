//! The `IgnoresAccessChecksTo` marker source file.
//!
//! The runtime honors `System.Runtime.CompilerServices.IgnoresAccessChecksToAttribute` on
//! the consuming assembly, but the framework does not ship the attribute type. The generated
//! file therefore declares it next to the assembly-level usages.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::Result;

/// File name of the generated marker source.
pub const MARKER_FILE_NAME: &str = "IgnoresAccessChecksTo.cs";

const ATTRIBUTE_DECLARATION: [&str; 9] = [
    "namespace System.Runtime.CompilerServices;",
    "",
    "[AttributeUsage(AttributeTargets.Assembly, AllowMultiple = true)]",
    "internal sealed class IgnoresAccessChecksToAttribute : Attribute",
    "{",
    "\tpublic IgnoresAccessChecksToAttribute(string assemblyName)",
    "\t{",
    "\t}",
    "}",
];

/// Renders the marker source for `assembly_names`.
///
/// One attribute usage per name, a blank line, the attribute declaration and a trailing
/// blank line. Lines end in `\n`.
#[must_use]
pub fn marker_source<S: AsRef<str>>(assembly_names: &[S]) -> String {
    let mut source = String::new();
    for name in assembly_names {
        source.push_str(&format!(
            "[assembly: System.Runtime.CompilerServices.IgnoresAccessChecksTo(\"{}\")]\n",
            name.as_ref()
        ));
    }

    source.push('\n');
    for line in ATTRIBUTE_DECLARATION {
        source.push_str(line);
        source.push('\n');
    }
    source.push('\n');

    source
}

/// Writes the marker source for `assembly_names` into `directory`, replacing an existing
/// one, and returns its path.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if the file cannot be written.
pub fn write_marker_file<S: AsRef<str>>(directory: &Path, assembly_names: &[S]) -> Result<PathBuf> {
    let path = directory.join(MARKER_FILE_NAME);
    fs::write(&path, marker_source(assembly_names))?;
    debug!("Generated IgnoresAccessChecksTo attributes at {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_text() {
        let expected = "\
[assembly: System.Runtime.CompilerServices.IgnoresAccessChecksTo(\"Foo\")]
[assembly: System.Runtime.CompilerServices.IgnoresAccessChecksTo(\"Bar.Baz\")]

namespace System.Runtime.CompilerServices;

[AttributeUsage(AttributeTargets.Assembly, AllowMultiple = true)]
internal sealed class IgnoresAccessChecksToAttribute : Attribute
{
\tpublic IgnoresAccessChecksToAttribute(string assemblyName)
\t{
\t}
}

";
        assert_eq!(marker_source(&["Foo", "Bar.Baz"]), expected);
    }

    #[test]
    fn no_names() {
        let source = marker_source::<&str>(&[]);
        assert!(source.starts_with("\nnamespace System.Runtime.CompilerServices;\n"));
        assert!(!source.contains("[assembly:"));
    }

    #[test]
    fn write_replaces() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MARKER_FILE_NAME), "stale").unwrap();

        let path = write_marker_file(dir.path(), &["Foo".to_string()]).unwrap();
        assert_eq!(path, dir.path().join(MARKER_FILE_NAME));

        let text = fs::read_to_string(path).unwrap();
        assert!(text.starts_with(
            "[assembly: System.Runtime.CompilerServices.IgnoresAccessChecksTo(\"Foo\")]\n\n"
        ));
    }
}

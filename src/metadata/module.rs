//! Loaded .NET modules.
//!
//! [`CilModule::read`] parses one PE image into the entity model the rewriter works on:
//! a flat arena of [`TypeDef`]s with their fields and methods, the assembly identity, and the
//! assembly references. The original image stays mapped, and [`CilModule::write`] emits a
//! patched copy of it, so everything the model does not describe survives byte for byte.
//!
//! Reading is done in three steps:
//!
//! 1. PE, CLI header and metadata root, through [`crate::file::File`] and
//!    [`crate::metadata::root::Root`]
//! 2. The heaps and the tables the model needs, with `FieldPtr`/`MethodPtr` indirection
//! 3. Method bodies, and with [`ReadOptions::resolve_dependencies`] every transitive
//!    dependency through the [`crate::resolver::ResolutionSession`]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    file::File,
    metadata::{
        access::{MemberAccess, TypeVisibility},
        cor20header::Cor20Header,
        field::FieldDef,
        identity::{AssemblyIdentity, AssemblyReference},
        method::{MethodBody, MethodDef, MethodModifiers},
        root::Root,
        streams::{Blob, Guid, Strings, TablesHeader},
        tables::{
            AssemblyRaw, AssemblyRefRaw, FieldPtrRaw, FieldRaw, FileRaw, MethodDefRaw,
            MethodPtrRaw, ModuleRaw, NestedClassRaw, TableId, TypeDefRaw,
        },
        typedef::{nested_name, top_level_name, TypeDef},
    },
    resolver::ResolutionSession,
    Result,
};

/// What [`CilModule::read`] loads besides the type model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Load every transitive dependency through the session before returning
    pub resolve_dependencies: bool,
    /// Parse method bodies and decode their instructions
    pub decode_bodies: bool,
    /// Look for a `<stem>.pdb` next to the image
    pub read_symbols: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            resolve_dependencies: true,
            decode_bodies: true,
            read_symbols: true,
        }
    }
}

impl ReadOptions {
    /// Options for modules loaded to satisfy a reference: types only.
    #[must_use]
    pub fn dependency() -> Self {
        ReadOptions {
            resolve_dependencies: false,
            decode_bodies: false,
            read_symbols: false,
        }
    }

    /// Sets [`ReadOptions::resolve_dependencies`].
    #[must_use]
    pub fn with_dependencies(mut self, enabled: bool) -> Self {
        self.resolve_dependencies = enabled;
        self
    }

    /// Sets [`ReadOptions::decode_bodies`].
    #[must_use]
    pub fn with_bodies(mut self, enabled: bool) -> Self {
        self.decode_bodies = enabled;
        self
    }

    /// Sets [`ReadOptions::read_symbols`].
    #[must_use]
    pub fn with_symbols(mut self, enabled: bool) -> Self {
        self.read_symbols = enabled;
        self
    }
}

/// File offsets of the rows the writer patches, indexed by `rid - 1`.
#[derive(Debug, Default, Clone)]
pub(crate) struct RowOffsets {
    pub types: Vec<usize>,
    pub fields: Vec<usize>,
    pub methods: Vec<usize>,
}

/// Extent of an original method body: file offset and size, header and sections included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BodyExtent {
    pub offset: usize,
    pub size: usize,
}

/// A loaded PE module.
pub struct CilModule {
    path: PathBuf,
    file: File,
    header: Cor20Header,
    runtime_version: String,
    name: String,
    mvid: [u8; 16],
    assembly: Option<AssemblyIdentity>,
    references: Vec<AssemblyReference>,
    module_files: Vec<String>,
    types: Vec<TypeDef>,
    table_rows: Vec<(TableId, u32)>,
    symbols: Option<PathBuf>,
    rows: RowOffsets,
    bodies: HashMap<u32, BodyExtent>,
}

impl CilModule {
    /// Reads the module at `path`.
    ///
    /// # Errors
    /// - [`crate::Error::FileError`] if the file cannot be read
    /// - [`crate::Error::BadImage`] if it is not a valid .NET module
    /// - [`crate::Error::Structural`] for an undefined member access value
    /// - [`crate::Error::Resolution`] if a dependency cannot be found
    pub fn read(path: &Path, session: &ResolutionSession, options: ReadOptions) -> Result<Self> {
        let file = File::from_file(path).map_err(|error| error.into_bad_image(path))?;
        let module = Self::load(path, file, options).map_err(|error| error.into_bad_image(path))?;

        debug!(
            "Read {} ({} types, {} references)",
            path.display(),
            module.types.len(),
            module.references.len()
        );

        if options.resolve_dependencies {
            session.resolve_all(&module.references)?;
        }

        Ok(module)
    }

    fn load(path: &Path, file: File, options: ReadOptions) -> Result<Self> {
        let (clr_rva, clr_size) = file.clr();
        if clr_size < Cor20Header::SIZE {
            return Err(malformed_error!("CLR header too small - {}", clr_size));
        }

        let clr_offset = file.rva_to_offset(clr_rva)?;
        let header = Cor20Header::read(file.data_slice(clr_offset, Cor20Header::SIZE)?)?;

        let meta_offset = file.rva_to_offset(header.meta_data_rva as usize)?;
        let meta = file.data_slice(meta_offset, header.meta_data_size as usize)?;
        let root = Root::read(meta)?;

        let stream = |name: &str| {
            root.stream(name).map(|header| {
                let start = header.offset as usize;
                (start, &meta[start..start + header.size as usize])
            })
        };

        let Some((tables_offset, tables_data)) = stream("#~").or_else(|| stream("#-")) else {
            return Err(malformed_error!("Metadata has no tables stream"));
        };
        let Some((_, strings_data)) = stream("#Strings") else {
            return Err(malformed_error!("Metadata has no #Strings heap"));
        };

        let tables = TablesHeader::from(tables_data)?;
        let strings = Strings::from(strings_data)?;
        let blobs = match stream("#Blob") {
            Some((_, data)) => Some(Blob::from(data)?),
            None => None,
        };
        let guids = match stream("#GUID") {
            Some((_, data)) => Some(Guid::from(data)?),
            None => None,
        };

        let tables_file_offset = meta_offset + tables_offset;

        let module_rows = tables.table::<ModuleRaw>()?;
        let Some(module_row) = module_rows.first() else {
            return Err(malformed_error!("Module table is empty"));
        };
        let name = strings.get(module_row.name as usize)?.to_string();
        let mvid = match &guids {
            Some(guids) => guids.get(module_row.mvid as usize)?,
            None => [0; 16],
        };

        let type_rows = tables.table::<TypeDefRaw>()?;
        let field_rows = tables.table::<FieldRaw>()?;
        let method_rows = tables.table::<MethodDefRaw>()?;
        let field_ptrs = tables.table::<FieldPtrRaw>()?;
        let method_ptrs = tables.table::<MethodPtrRaw>()?;
        let nested_rows = tables.table::<NestedClassRaw>()?;

        let field_count = if field_ptrs.is_empty() {
            tables.table_row_count(TableId::Field)
        } else {
            tables.table_row_count(TableId::FieldPtr)
        };
        let method_count = if method_ptrs.is_empty() {
            tables.table_row_count(TableId::MethodDef)
        } else {
            tables.table_row_count(TableId::MethodPtr)
        };
        let ranges = TypeDefRaw::member_ranges(&type_rows, field_count, method_count)?;

        let mut bodies = HashMap::new();
        let mut types = Vec::with_capacity(type_rows.len());
        for (row, (field_range, method_range)) in type_rows.iter().zip(ranges) {
            let mut fields = Vec::with_capacity(field_range.len());
            for logical in field_range {
                let physical = indirect(logical, &field_ptrs, |ptr| ptr.field)?;
                let Some(raw) = field_rows.get(physical as usize - 1) else {
                    return Err(malformed_error!("Field row {} out of range", physical));
                };
                fields.push(FieldDef {
                    rid: raw.rid,
                    token: raw.token,
                    name: strings.get(raw.name as usize)?.to_string(),
                    access: MemberAccess::from_flags(raw.flags)?,
                    flags: raw.flags,
                });
            }

            let mut methods = Vec::with_capacity(method_range.len());
            for logical in method_range {
                let physical = indirect(logical, &method_ptrs, |ptr| ptr.method)?;
                let Some(raw) = method_rows.get(physical as usize - 1) else {
                    return Err(malformed_error!("MethodDef row {} out of range", physical));
                };
                let mut method = MethodDef {
                    rid: raw.rid,
                    token: raw.token,
                    name: strings.get(raw.name as usize)?.to_string(),
                    access: MemberAccess::from_flags(raw.flags)?,
                    modifiers: MethodModifiers::from_bits_truncate(raw.flags),
                    flags: raw.flags,
                    impl_flags: raw.impl_flags,
                    rva: raw.rva,
                    body: None,
                };

                if options.decode_bodies && method.has_il_body() {
                    let offset = file.rva_to_offset(raw.rva as usize)?;
                    let Some(data) = file.data().get(offset..) else {
                        return Err(out_of_bounds_error!());
                    };
                    let body = MethodBody::parse(data, raw.rva, offset, true)?;
                    bodies.insert(
                        raw.rva,
                        BodyExtent {
                            offset,
                            size: body.size(),
                        },
                    );
                    method.body = Some(body);
                }
                methods.push(method);
            }

            let visibility = TypeVisibility::from_flags(row.flags);
            let namespace = strings.get(row.type_namespace as usize)?.to_string();
            let type_name = strings.get(row.type_name as usize)?.to_string();
            types.push(TypeDef {
                rid: row.rid,
                token: row.token,
                full_name: top_level_name(&namespace, &type_name),
                namespace,
                name: type_name,
                visibility,
                flags: row.flags,
                fields,
                methods,
                enclosing: None,
                nested: Vec::new(),
            });
        }

        link_nested(&mut types, &nested_rows)?;

        let (assembly, references, module_files) = match &blobs {
            Some(blobs) => {
                let assembly = match tables.table::<AssemblyRaw>()?.first() {
                    Some(raw) => Some(AssemblyIdentity::from_raw(raw, &strings, blobs)?),
                    None => None,
                };
                let references = tables
                    .table::<AssemblyRefRaw>()?
                    .iter()
                    .map(|raw| AssemblyReference::from_raw(raw, &strings, blobs))
                    .collect::<Result<Vec<_>>>()?;
                let module_files = tables
                    .table::<FileRaw>()?
                    .iter()
                    .filter(|raw| raw.contains_metadata())
                    .map(|raw| strings.get(raw.name as usize).map(str::to_string))
                    .collect::<Result<Vec<_>>>()?;
                (assembly, references, module_files)
            }
            None => (None, Vec::new(), Vec::new()),
        };

        let rows = RowOffsets {
            types: type_rows.iter().map(|r| tables_file_offset + r.offset).collect(),
            fields: field_rows.iter().map(|r| tables_file_offset + r.offset).collect(),
            methods: method_rows.iter().map(|r| tables_file_offset + r.offset).collect(),
        };

        let symbols = if options.read_symbols {
            let pdb = path.with_extension("pdb");
            pdb.is_file().then_some(pdb)
        } else {
            None
        };

        let table_rows = tables.present_tables().collect();

        Ok(CilModule {
            path: path.to_path_buf(),
            runtime_version: root.version.clone(),
            header,
            name,
            mvid,
            assembly,
            references,
            module_files,
            types,
            table_rows,
            symbols,
            rows,
            bodies,
            file,
        })
    }

    /// Writes the module, with every change made to its types, to `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Layout`] if replaced bodies do not fit into the image and
    /// [`crate::Error::FileError`] if the output cannot be written.
    pub fn write(&self, path: &Path) -> Result<()> {
        crate::cilassembly::write::write_module(self, path)
    }

    /// The path the module was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The module name from the `Module` table.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The module version id.
    #[must_use]
    pub fn mvid(&self) -> &[u8; 16] {
        &self.mvid
    }

    /// The runtime version string of the metadata root.
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// The CLI header.
    #[must_use]
    pub fn header(&self) -> &Cor20Header {
        &self.header
    }

    /// The identity of the assembly, `None` for netmodules.
    #[must_use]
    pub fn assembly(&self) -> Option<&AssemblyIdentity> {
        self.assembly.as_ref()
    }

    /// The assembly references in `AssemblyRef` order.
    #[must_use]
    pub fn references(&self) -> &[AssemblyReference] {
        &self.references
    }

    /// Names of the other metadata-bearing files of the assembly.
    #[must_use]
    pub fn module_files(&self) -> &[String] {
        &self.module_files
    }

    /// All types in `TypeDef` order, nested types included.
    #[must_use]
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// Mutable access to the type arena.
    pub fn types_mut(&mut self) -> &mut [TypeDef] {
        &mut self.types
    }

    /// Present metadata tables and their row counts.
    #[must_use]
    pub fn table_rows(&self) -> &[(TableId, u32)] {
        &self.table_rows
    }

    /// The sidecar symbol file, when one was found.
    #[must_use]
    pub fn symbols(&self) -> Option<&Path> {
        self.symbols.as_deref()
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    pub(crate) fn rows(&self) -> &RowOffsets {
        &self.rows
    }

    pub(crate) fn body_extent(&self, rva: u32) -> Option<BodyExtent> {
        self.bodies.get(&rva).copied()
    }

    /// Returns the file extents of all method bodies read from the image.
    pub(crate) fn body_extents(&self) -> impl Iterator<Item = BodyExtent> + '_ {
        self.bodies.values().copied()
    }
}

impl std::fmt::Debug for CilModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CilModule")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("types", &self.types.len())
            .field("references", &self.references.len())
            .finish_non_exhaustive()
    }
}

/// Maps a logical row id through an optional pointer table.
fn indirect<T>(logical: u32, ptrs: &[T], target: impl Fn(&T) -> u32) -> Result<u32> {
    if ptrs.is_empty() {
        return Ok(logical);
    }

    match ptrs.get(logical as usize - 1) {
        Some(ptr) if target(ptr) != 0 => Ok(target(ptr)),
        _ => Err(malformed_error!("Invalid pointer table entry {}", logical)),
    }
}

/// Fills in the nesting links from the `NestedClass` table and derives the full names of
/// nested types.
fn link_nested(types: &mut [TypeDef], nested_rows: &[NestedClassRaw]) -> Result<()> {
    let count = types.len();
    for row in nested_rows {
        let (nested, enclosing) = (row.nested_class as usize, row.enclosing_class as usize);
        if nested == 0 || nested > count || enclosing == 0 || enclosing > count || nested == enclosing
        {
            return Err(malformed_error!(
                "Invalid NestedClass row {} - {} in {}",
                row.rid,
                nested,
                enclosing
            ));
        }

        types[nested - 1].enclosing = Some(enclosing - 1);
        types[enclosing - 1].nested.push(nested - 1);
    }

    let mut resolved = vec![false; count];
    for index in 0..count {
        let mut chain = Vec::new();
        let mut current = index;
        while !resolved[current] {
            match types[current].enclosing {
                Some(parent) => {
                    chain.push(current);
                    if chain.len() > count {
                        return Err(malformed_error!(
                            "Cyclic nesting at type {}",
                            types[index].token
                        ));
                    }
                    current = parent;
                }
                None => {
                    resolved[current] = true;
                }
            }
        }

        while let Some(child) = chain.pop() {
            if let Some(parent) = types[child].enclosing {
                types[child].full_name = nested_name(&types[parent].full_name, &types[child].name);
            }
            resolved[child] = true;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::token::Token;

    fn ty(rid: u32, namespace: &str, name: &str) -> TypeDef {
        TypeDef {
            rid,
            token: Token::from_parts(TableId::TypeDef, rid),
            namespace: namespace.to_string(),
            name: name.to_string(),
            full_name: top_level_name(namespace, name),
            visibility: TypeVisibility::NotPublic,
            flags: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            enclosing: None,
            nested: Vec::new(),
        }
    }

    fn nested(rid: u32, nested_class: u32, enclosing_class: u32) -> NestedClassRaw {
        NestedClassRaw {
            rid,
            nested_class,
            enclosing_class,
        }
    }

    #[test]
    fn nested_full_names() {
        let mut types = vec![
            ty(1, "", "<Module>"),
            ty(2, "", "Deep"),
            ty(3, "Foo", "Bar"),
            ty(4, "", "Inner"),
        ];
        // Deep is nested in Inner, which is nested in Bar; rows are out of order on purpose
        let rows = [nested(1, 2, 4), nested(2, 4, 3)];

        link_nested(&mut types, &rows).unwrap();

        assert_eq!(types[2].full_name, "Foo.Bar");
        assert_eq!(types[3].full_name, "Foo.Bar/Inner");
        assert_eq!(types[1].full_name, "Foo.Bar/Inner/Deep");
        assert_eq!(types[2].nested, vec![3]);
        assert_eq!(types[1].enclosing, Some(3));
        assert!(!types[2].is_nested());
    }

    #[test]
    fn cyclic_nesting() {
        let mut types = vec![ty(1, "", "A"), ty(2, "", "B")];
        let rows = [nested(1, 1, 2), nested(2, 2, 1)];
        assert!(link_nested(&mut types, &rows).is_err());
    }

    #[test]
    fn invalid_nesting_row() {
        let mut types = vec![ty(1, "", "A")];
        assert!(link_nested(&mut types, &[nested(1, 1, 5)]).is_err());
        assert!(link_nested(&mut types, &[nested(1, 1, 1)]).is_err());
    }

    #[test]
    fn pointer_indirection() {
        let ptrs = [
            FieldPtrRaw { rid: 1, field: 3 },
            FieldPtrRaw { rid: 2, field: 1 },
        ];
        assert_eq!(indirect(2, &ptrs, |p| p.field).unwrap(), 1);
        assert_eq!(indirect(2, &[] as &[FieldPtrRaw], |p| p.field).unwrap(), 2);
        assert!(indirect(3, &ptrs, |p| p.field).is_err());
    }

    #[test]
    fn read_options() {
        let options = ReadOptions::default().with_bodies(false);
        assert!(options.resolve_dependencies);
        assert!(!options.decode_bodies);
        assert_eq!(
            ReadOptions::dependency(),
            ReadOptions::default()
                .with_dependencies(false)
                .with_bodies(false)
                .with_symbols(false)
        );
    }
}

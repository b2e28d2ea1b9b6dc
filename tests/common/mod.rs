//! Synthesized .NET PE images for the integration tests.
//!
//! [`ImageBuilder`] lays out a minimal PE32 DLL with a single `.text` section holding the
//! CLI header, tiny method bodies and the metadata. All heaps and tables use small
//! indexes. By default the section carries raw-data slack behind its virtual size.
//! [`ImageBuilder::with_slack`] with zero declares the whole raw data in use, and a
//! trailing section or an attribute certificate can be added behind `.text`.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use publicizer::cilassembly::write::pe_checksum;

pub const FILE_ALIGNMENT: usize = 0x200;
pub const SECTION_ALIGNMENT: u32 = 0x2000;
pub const TEXT_RVA: u32 = 0x2000;
pub const PE_OFFSET: usize = 0x80;
pub const OPTIONAL_HEADER_OFFSET: usize = PE_OFFSET + 24;
pub const CHECKSUM_OFFSET: usize = OPTIONAL_HEADER_OFFSET + 64;
pub const NUMBER_OF_SECTIONS_OFFSET: usize = PE_OFFSET + 6;
pub const SECTION_TABLE_OFFSET: usize = OPTIONAL_HEADER_OFFSET + 0xE0;
/// Raw size of the section added by [`ImageBuilder::with_trailing_section`]
pub const TRAILING_SECTION_SIZE: usize = 0x200;

/// `ldc.i4.1; ret`
pub const RETURN_ONE: [u8; 2] = [0x17, 0x2A];

pub const TYPE_NOT_PUBLIC: u32 = 0x0;
pub const TYPE_PUBLIC: u32 = 0x1;
pub const TYPE_NESTED_PUBLIC: u32 = 0x2;
pub const TYPE_NESTED_PRIVATE: u32 = 0x3;
pub const TYPE_NESTED_ASSEMBLY: u32 = 0x5;
pub const TYPE_NESTED_FAM_OR_ASSEM: u32 = 0x7;
pub const TYPE_ABSTRACT: u32 = 0x80;

pub const MEMBER_PRIVATE: u16 = 0x1;
pub const MEMBER_FAM_AND_ASSEM: u16 = 0x2;
pub const MEMBER_ASSEMBLY: u16 = 0x3;
pub const MEMBER_FAMILY: u16 = 0x4;
pub const MEMBER_FAM_OR_ASSEM: u16 = 0x5;
pub const MEMBER_PUBLIC: u16 = 0x6;
pub const METHOD_STATIC: u16 = 0x10;
pub const METHOD_ABSTRACT: u16 = 0x400;
pub const METHOD_HIDE_BY_SIG: u16 = 0x80;

#[derive(Debug, Clone)]
pub struct MethodSpec {
    pub name: String,
    pub flags: u16,
    pub impl_flags: u16,
    pub code: Option<Vec<u8>>,
}

impl MethodSpec {
    /// A method returning 1.
    pub fn new(name: &str, flags: u16) -> Self {
        MethodSpec {
            name: name.to_string(),
            flags: flags | METHOD_HIDE_BY_SIG,
            impl_flags: 0,
            code: Some(RETURN_ONE.to_vec()),
        }
    }

    /// A method without a body.
    pub fn abstract_method(name: &str, flags: u16) -> Self {
        MethodSpec {
            name: name.to_string(),
            flags: flags | METHOD_ABSTRACT | METHOD_HIDE_BY_SIG,
            impl_flags: 0,
            code: None,
        }
    }

    pub fn with_code(mut self, code: &[u8]) -> Self {
        self.code = Some(code.to_vec());
        self
    }
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub namespace: String,
    pub name: String,
    pub flags: u32,
    pub fields: Vec<(String, u16)>,
    pub methods: Vec<MethodSpec>,
    /// Index of the enclosing type in the builder's type list
    pub enclosing: Option<usize>,
}

impl TypeSpec {
    pub fn new(namespace: &str, name: &str, flags: u32) -> Self {
        TypeSpec {
            namespace: namespace.to_string(),
            name: name.to_string(),
            flags,
            fields: Vec::new(),
            methods: Vec::new(),
            enclosing: None,
        }
    }

    pub fn nested_in(mut self, enclosing: usize) -> Self {
        self.enclosing = Some(enclosing);
        self
    }

    pub fn field(mut self, name: &str, flags: u16) -> Self {
        self.fields.push((name.to_string(), flags));
        self
    }

    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }
}

/// Builds a module image.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    module_name: String,
    assembly_name: Option<String>,
    types: Vec<TypeSpec>,
    references: Vec<(String, u32)>,
    checksum: bool,
    slack: usize,
    trailing_section: bool,
    certificate: bool,
}

impl ImageBuilder {
    /// An assembly named `name` whose module is `<name>.dll`.
    pub fn new(name: &str) -> Self {
        ImageBuilder {
            module_name: format!("{name}.dll"),
            assembly_name: Some(name.to_string()),
            types: Vec::new(),
            references: Vec::new(),
            checksum: false,
            slack: 0x100,
            trailing_section: false,
            certificate: false,
        }
    }

    pub fn with_type(mut self, ty: TypeSpec) -> Self {
        self.types.push(ty);
        self
    }

    pub fn with_reference(mut self, name: &str) -> Self {
        self.references.push((name.to_string(), 0));
        self
    }

    pub fn with_windows_runtime_reference(mut self, name: &str) -> Self {
        self.references.push((name.to_string(), 0x0200));
        self
    }

    pub fn with_checksum(mut self) -> Self {
        self.checksum = true;
        self
    }

    /// Raw-data bytes behind the section contents. Zero makes the virtual size cover all
    /// raw data.
    pub fn with_slack(mut self, slack: usize) -> Self {
        self.slack = slack;
        self
    }

    /// Adds a `.rsrc` section behind `.text`, in the file and in memory.
    pub fn with_trailing_section(mut self) -> Self {
        self.trailing_section = true;
        self
    }

    /// Ends the file in an attribute certificate table.
    pub fn with_certificate(mut self) -> Self {
        self.certificate = true;
        self
    }

    /// Writes the image to `dir/file_name` and returns the path.
    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, self.build()).unwrap();
        path
    }

    pub fn build(&self) -> Vec<u8> {
        let mut strings = StringHeap::default();
        let mut blobs = vec![0u8];
        let method_sig = push_blob(&mut blobs, &[0x00, 0x00, 0x01]);
        let field_sig = push_blob(&mut blobs, &[0x06, 0x08]);

        // .text: CLI header, bodies, metadata
        let mut text = vec![0u8; 72];
        let mut body_rvas = Vec::new();
        for method in self.types.iter().flat_map(|ty| ty.methods.iter()) {
            match &method.code {
                Some(code) => {
                    align(&mut text, 4);
                    body_rvas.push(TEXT_RVA + text.len() as u32);
                    assert!(code.len() < 64);
                    text.push(((code.len() as u8) << 2) | 0x2);
                    text.extend_from_slice(code);
                }
                None => body_rvas.push(0),
            }
        }
        align(&mut text, 4);

        let tables = self.tables(&mut strings, method_sig, field_sig, &body_rvas);
        let metadata = metadata_root(&tables, &strings.finish(), &blobs);
        let metadata_rva = TEXT_RVA + text.len() as u32;
        let metadata_size = metadata.len() as u32;
        text.extend_from_slice(&metadata);

        let mut cli = Vec::with_capacity(72);
        put_u32(&mut cli, 72);
        put_u16(&mut cli, 2);
        put_u16(&mut cli, 5);
        put_u32(&mut cli, metadata_rva);
        put_u32(&mut cli, metadata_size);
        put_u32(&mut cli, 1);
        cli.resize(72, 0);
        text[..72].copy_from_slice(&cli);

        let raw_size = (text.len() + self.slack).next_multiple_of(FILE_ALIGNMENT);
        let virtual_size = if self.slack == 0 { raw_size } else { text.len() };
        text.resize(raw_size, 0);

        let mut image = self.headers(virtual_size as u32, raw_size as u32);
        image.extend_from_slice(&text);
        if self.trailing_section {
            image.resize(image.len() + TRAILING_SECTION_SIZE, 0);
        }
        if self.certificate {
            // WIN_CERTIFICATE: length, revision 2.0, PKCS#7 signed data
            put_u32(&mut image, 16);
            put_u16(&mut image, 0x0200);
            put_u16(&mut image, 0x0002);
            image.extend_from_slice(&[0xC3; 8]);
        }

        if self.checksum {
            let checksum = pe_checksum(&image, CHECKSUM_OFFSET);
            image[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
        }

        image
    }

    /// RVA of the section added by [`ImageBuilder::with_trailing_section`].
    fn trailing_rva(raw_size: u32) -> u32 {
        (TEXT_RVA + raw_size).next_multiple_of(SECTION_ALIGNMENT)
    }

    fn headers(&self, virtual_size: u32, raw_size: u32) -> Vec<u8> {
        let trailing_rva = Self::trailing_rva(raw_size);
        let image_end = if self.trailing_section {
            trailing_rva + TRAILING_SECTION_SIZE as u32
        } else {
            TEXT_RVA + virtual_size
        };
        let mut sections_end = FILE_ALIGNMENT as u32 + raw_size;
        if self.trailing_section {
            sections_end += TRAILING_SECTION_SIZE as u32;
        }

        let mut image = vec![0u8; FILE_ALIGNMENT];
        image[0] = b'M';
        image[1] = b'Z';
        image[0x3C..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());

        let mut pe = Vec::new();
        pe.extend_from_slice(b"PE\0\0");
        // COFF header
        put_u16(&mut pe, 0x014C);
        put_u16(&mut pe, if self.trailing_section { 2 } else { 1 });
        put_u32(&mut pe, 0);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, 0);
        put_u16(&mut pe, 0xE0);
        put_u16(&mut pe, 0x2102);

        // Optional header, standard fields
        put_u16(&mut pe, 0x010B);
        pe.push(8);
        pe.push(0);
        put_u32(&mut pe, raw_size);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, TEXT_RVA);
        put_u32(&mut pe, 0);

        // Windows fields
        put_u32(&mut pe, 0x1000_0000);
        put_u32(&mut pe, SECTION_ALIGNMENT);
        put_u32(&mut pe, FILE_ALIGNMENT as u32);
        put_u16(&mut pe, 4);
        put_u16(&mut pe, 0);
        put_u16(&mut pe, 0);
        put_u16(&mut pe, 0);
        put_u16(&mut pe, 4);
        put_u16(&mut pe, 0);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, image_end.next_multiple_of(SECTION_ALIGNMENT));
        put_u32(&mut pe, FILE_ALIGNMENT as u32);
        put_u32(&mut pe, 0);
        put_u16(&mut pe, 3);
        put_u16(&mut pe, 0x8540);
        put_u32(&mut pe, 0x0010_0000);
        put_u32(&mut pe, 0x1000);
        put_u32(&mut pe, 0x0010_0000);
        put_u32(&mut pe, 0x1000);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, 16);

        // Data directories, the CLI header and an optional certificate table
        for index in 0..16 {
            if index == 14 {
                put_u32(&mut pe, TEXT_RVA);
                put_u32(&mut pe, 72);
            } else if index == 4 && self.certificate {
                put_u32(&mut pe, sections_end);
                put_u32(&mut pe, 16);
            } else {
                put_u32(&mut pe, 0);
                put_u32(&mut pe, 0);
            }
        }

        // Section table
        pe.extend_from_slice(b".text\0\0\0");
        put_u32(&mut pe, virtual_size);
        put_u32(&mut pe, TEXT_RVA);
        put_u32(&mut pe, raw_size);
        put_u32(&mut pe, FILE_ALIGNMENT as u32);
        put_u32(&mut pe, 0);
        put_u32(&mut pe, 0);
        put_u16(&mut pe, 0);
        put_u16(&mut pe, 0);
        put_u32(&mut pe, 0x6000_0020);

        if self.trailing_section {
            pe.extend_from_slice(b".rsrc\0\0\0");
            put_u32(&mut pe, 0x10);
            put_u32(&mut pe, trailing_rva);
            put_u32(&mut pe, TRAILING_SECTION_SIZE as u32);
            put_u32(&mut pe, FILE_ALIGNMENT as u32 + raw_size);
            put_u32(&mut pe, 0);
            put_u32(&mut pe, 0);
            put_u16(&mut pe, 0);
            put_u16(&mut pe, 0);
            put_u32(&mut pe, 0x4000_0040);
        }

        image[PE_OFFSET..PE_OFFSET + pe.len()].copy_from_slice(&pe);
        image
    }

    fn tables(
        &self,
        strings: &mut StringHeap,
        method_sig: u16,
        field_sig: u16,
        body_rvas: &[u32],
    ) -> Vec<u8> {
        let field_count: usize = self.types.iter().map(|ty| ty.fields.len()).sum();
        let method_count: usize = self.types.iter().map(|ty| ty.methods.len()).sum();
        let nested: Vec<(usize, usize)> = self
            .types
            .iter()
            .enumerate()
            .filter_map(|(index, ty)| ty.enclosing.map(|enclosing| (index, enclosing)))
            .collect();

        let mut present: Vec<(u32, u32)> = vec![(0x00, 1), (0x02, self.types.len() as u32 + 1)];
        if field_count > 0 {
            present.push((0x04, field_count as u32));
        }
        if method_count > 0 {
            present.push((0x06, method_count as u32));
        }
        if self.assembly_name.is_some() {
            present.push((0x20, 1));
        }
        if !self.references.is_empty() {
            present.push((0x23, self.references.len() as u32));
        }
        if !nested.is_empty() {
            present.push((0x29, nested.len() as u32));
        }

        let mut data = Vec::new();
        put_u32(&mut data, 0);
        data.push(2);
        data.push(0);
        data.push(0);
        data.push(1);
        let valid = present.iter().fold(0u64, |valid, (table, _)| valid | 1 << table);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        for (_, rows) in &present {
            put_u32(&mut data, *rows);
        }

        // Module
        put_u16(&mut data, 0);
        put_u16(&mut data, strings.add(&self.module_name));
        put_u16(&mut data, 1);
        put_u16(&mut data, 0);
        put_u16(&mut data, 0);

        // TypeDef, <Module> first
        let module_type = strings.add("<Module>");
        put_u32(&mut data, 0);
        put_u16(&mut data, module_type);
        put_u16(&mut data, 0);
        put_u16(&mut data, 0);
        put_u16(&mut data, 1);
        put_u16(&mut data, 1);

        let mut field_list = 1u16;
        let mut method_list = 1u16;
        for ty in &self.types {
            put_u32(&mut data, ty.flags);
            put_u16(&mut data, strings.add(&ty.name));
            put_u16(&mut data, strings.add(&ty.namespace));
            put_u16(&mut data, 0);
            put_u16(&mut data, field_list);
            put_u16(&mut data, method_list);
            field_list += ty.fields.len() as u16;
            method_list += ty.methods.len() as u16;
        }

        // Field
        for (name, flags) in self.types.iter().flat_map(|ty| ty.fields.iter()) {
            put_u16(&mut data, *flags);
            put_u16(&mut data, strings.add(name));
            put_u16(&mut data, field_sig);
        }

        // MethodDef
        for (method, rva) in self
            .types
            .iter()
            .flat_map(|ty| ty.methods.iter())
            .zip(body_rvas)
        {
            put_u32(&mut data, *rva);
            put_u16(&mut data, method.impl_flags);
            put_u16(&mut data, method.flags);
            put_u16(&mut data, strings.add(&method.name));
            put_u16(&mut data, method_sig);
            put_u16(&mut data, 1);
        }

        // Assembly
        if let Some(name) = &self.assembly_name {
            put_u32(&mut data, 0x8004);
            put_u16(&mut data, 1);
            put_u16(&mut data, 0);
            put_u16(&mut data, 0);
            put_u16(&mut data, 0);
            put_u32(&mut data, 0);
            put_u16(&mut data, 0);
            put_u16(&mut data, strings.add(name));
            put_u16(&mut data, 0);
        }

        // AssemblyRef
        for (name, flags) in &self.references {
            put_u16(&mut data, 1);
            put_u16(&mut data, 0);
            put_u16(&mut data, 0);
            put_u16(&mut data, 0);
            put_u32(&mut data, *flags);
            put_u16(&mut data, 0);
            put_u16(&mut data, strings.add(name));
            put_u16(&mut data, 0);
            put_u16(&mut data, 0);
        }

        // NestedClass, rid 1 is <Module>
        for (nested, enclosing) in nested {
            put_u16(&mut data, nested as u16 + 2);
            put_u16(&mut data, enclosing as u16 + 2);
        }

        align(&mut data, 4);
        data
    }
}

#[derive(Default)]
struct StringHeap {
    data: Vec<u8>,
}

impl StringHeap {
    fn add(&mut self, value: &str) -> u16 {
        if self.data.is_empty() {
            self.data.push(0);
        }
        if value.is_empty() {
            return 0;
        }

        let index = self.data.len() as u16;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        index
    }

    fn finish(mut self) -> Vec<u8> {
        if self.data.is_empty() {
            self.data.push(0);
        }
        align(&mut self.data, 4);
        self.data
    }
}

fn metadata_root(tables: &[u8], strings: &[u8], blobs: &[u8]) -> Vec<u8> {
    let mut blobs = blobs.to_vec();
    align(&mut blobs, 4);
    let guid: [u8; 16] = [
        0x3C, 0x1E, 0x5A, 0x77, 0x10, 0x42, 0x4B, 0x9A, 0x8E, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB,
        0xCD,
    ];

    let version = b"v4.0.30319\0\0";
    let streams: [(&[u8], &[u8]); 4] = [
        (b"#~\0\0", tables),
        (b"#Strings\0\0\0\0", strings),
        (b"#GUID\0\0\0", &guid),
        (b"#Blob\0\0\0", &blobs),
    ];

    let header_size = 16
        + version.len()
        + 4
        + streams
            .iter()
            .map(|(name, _)| 8 + name.len())
            .sum::<usize>();

    let mut root = Vec::new();
    root.extend_from_slice(b"BSJB");
    put_u16(&mut root, 1);
    put_u16(&mut root, 1);
    put_u32(&mut root, 0);
    put_u32(&mut root, version.len() as u32);
    root.extend_from_slice(version);
    put_u16(&mut root, 0);
    put_u16(&mut root, streams.len() as u16);

    let mut offset = header_size;
    for (name, data) in &streams {
        put_u32(&mut root, offset as u32);
        put_u32(&mut root, data.len() as u32);
        root.extend_from_slice(name);
        offset += data.len();
    }
    for (_, data) in &streams {
        root.extend_from_slice(data);
    }

    root
}

fn push_blob(heap: &mut Vec<u8>, value: &[u8]) -> u16 {
    let index = heap.len() as u16;
    heap.push(value.len() as u8);
    heap.extend_from_slice(value);
    index
}

fn align(data: &mut Vec<u8>, alignment: usize) {
    data.resize(data.len().next_multiple_of(alignment), 0);
}

fn put_u16(data: &mut Vec<u8>, value: u16) {
    data.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut Vec<u8>, value: u32) {
    data.extend_from_slice(&value.to_le_bytes());
}

/// The `Foo.dll` of the scenarios: internal `Foo.Bar` with an internal `Baz()`.
pub fn foo_bar_baz() -> ImageBuilder {
    ImageBuilder::new("Foo").with_type(
        TypeSpec::new("Foo", "Bar", TYPE_NOT_PUBLIC)
            .field("count", MEMBER_ASSEMBLY)
            .method(MethodSpec::new("Baz", MEMBER_ASSEMBLY)),
    )
}

/// Reads the little-endian `u32` at `offset`.
pub fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

/// Number of sections declared in the COFF header.
pub fn section_count(data: &[u8]) -> u16 {
    u16::from_le_bytes(
        data[NUMBER_OF_SECTIONS_OFFSET..NUMBER_OF_SECTIONS_OFFSET + 2]
            .try_into()
            .unwrap(),
    )
}

/// Writes `bytes` into `dir/file_name`.
pub fn write_bytes(dir: &Path, file_name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, bytes).unwrap();
    path
}

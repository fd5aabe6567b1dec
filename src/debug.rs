//! Portable PDB blob encodings and deferred document checksums.

use std::sync::{Mutex, OnceLock};
use std::thread::JoinHandle;

use crate::constant::ConstantValue;
use crate::content_id::HashAlgorithm;
use crate::error::{Error, Result};
use crate::heaps::BlobHeap;
use crate::model::{DocumentId, SequencePoint};
use crate::signature::ElementType;
use crate::tables::{CodedIndex, CodedIndexKind};
use crate::writer::Writer;

/// Well-known language GUIDs of the Document table.
pub mod language {
    use uguid::{Guid, guid};

    pub const CSHARP: Guid = guid!("3f5162f8-07c6-11d3-9053-00c04fa302a1");
    pub const VISUAL_BASIC: Guid = guid!("3a12d0b8-c26c-11d0-b442-00a0244a1dd2");
    pub const FSHARP: Guid = guid!("ab4f38c9-b6e6-43ba-be3b-58080b2ccce3");
}

/// Hash of a source document, computed on a background thread.
///
/// The hash is joined the first time it is read; later reads return the cached value.
pub struct DocumentChecksum {
    algorithm: HashAlgorithm,
    pending: Mutex<Option<JoinHandle<Vec<u8>>>>,
    /// `None` once the computation has failed.
    value: OnceLock<Option<Vec<u8>>>,
}

impl DocumentChecksum {
    /// Start hashing `content` on a background thread.
    #[must_use]
    pub fn spawn(algorithm: HashAlgorithm, content: Vec<u8>) -> Self {
        Self::pending(algorithm, std::thread::spawn(move || algorithm.digest(&content)))
    }

    pub(crate) fn pending(algorithm: HashAlgorithm, handle: JoinHandle<Vec<u8>>) -> Self {
        Self {
            algorithm,
            pending: Mutex::new(Some(handle)),
            value: OnceLock::new(),
        }
    }

    /// A checksum that is already known.
    #[must_use]
    pub fn precomputed(algorithm: HashAlgorithm, hash: Vec<u8>) -> Self {
        Self {
            algorithm,
            pending: Mutex::new(None),
            value: OnceLock::from(Some(hash)),
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The hash, blocking until the background computation has finished.
    pub fn hash(&self) -> Result<&[u8]> {
        self.value
            .get_or_init(|| {
                let handle = match self.pending.lock() {
                    Ok(mut guard) => guard.take(),
                    Err(poisoned) => poisoned.into_inner().take(),
                };
                handle.and_then(|handle| handle.join().ok())
            })
            .as_deref()
            .ok_or(Error::ChecksumFailed)
    }
}

impl std::fmt::Debug for DocumentChecksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentChecksum")
            .field("algorithm", &self.algorithm)
            .field("ready", &self.value.get().is_some_and(Option::is_some))
            .finish()
    }
}

/// Separator a document name is split on: whichever of `/` and `\` occurs more often.
///
/// `/` wins a tie; a name with neither is stored whole under separator 0.
#[must_use]
pub fn document_name_separator(name: &str) -> u8 {
    let slashes = name.bytes().filter(|&b| b == b'/').count();
    let backslashes = name.bytes().filter(|&b| b == b'\\').count();
    match (slashes, backslashes) {
        (0, 0) => 0,
        (s, b) if s >= b => b'/',
        _ => b'\\',
    }
}

/// Encode a document name: the separator, then the #Blob offset of every part.
pub fn document_name_blob(name: &str, blobs: &mut BlobHeap) -> Result<Vec<u8>> {
    let separator = document_name_separator(name);
    let mut w = Writer::new();
    w.write_u8(separator);
    if separator == 0 {
        w.write_compressed_uint(blobs.add(name.as_bytes())?)?;
    } else {
        for part in name.split(char::from(separator)) {
            w.write_compressed_uint(blobs.add(part.as_bytes())?)?;
        }
    }
    Ok(w.to_vec())
}

/// Result of encoding the sequence points of one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePointsBlob {
    pub blob: Vec<u8>,
    /// Document row when every point is in one document; 0 otherwise.
    pub single_document: u32,
}

/// Encode a sequence points blob.
///
/// `local_signature` is the StandAloneSig row of the method's locals or 0, and `document_row`
/// maps each document to its Document row.
pub fn sequence_points_blob(
    local_signature: u32,
    points: &[SequencePoint],
    mut document_row: impl FnMut(DocumentId) -> Result<u32>,
) -> Result<SequencePointsBlob> {
    let mut w = Writer::new();
    w.write_compressed_uint(local_signature)?;

    let Some(first) = points.first() else {
        return Ok(SequencePointsBlob {
            blob: w.to_vec(),
            single_document: 0,
        });
    };
    let single = points.iter().all(|p| p.document == first.document);
    let mut current = document_row(first.document)?;
    if !single {
        w.write_compressed_uint(current)?;
    }

    let mut previous_offset = None;
    let mut previous_start: Option<(u32, u16)> = None;
    for point in points {
        let row = document_row(point.document)?;
        if row != current {
            w.write_compressed_uint(0)?;
            w.write_compressed_uint(row)?;
            current = row;
        }

        let delta_offset = match previous_offset {
            Some(previous) => point.il_offset.wrapping_sub(previous),
            None => point.il_offset,
        };
        w.write_compressed_uint(delta_offset)?;
        previous_offset = Some(point.il_offset);

        if point.is_hidden() {
            w.write_u16(0);
            continue;
        }

        let delta_lines = point.end_line.wrapping_sub(point.start_line);
        let delta_columns = i32::from(point.end_column) - i32::from(point.start_column);
        w.write_compressed_uint(delta_lines)?;
        if delta_lines == 0 {
            w.write_compressed_uint(delta_columns as u32)?;
        } else {
            w.write_compressed_int(delta_columns)?;
        }

        match previous_start {
            None => {
                w.write_compressed_uint(point.start_line)?;
                w.write_compressed_uint(u32::from(point.start_column))?;
            }
            Some((line, column)) => {
                w.write_compressed_int(point.start_line as i32 - line as i32)?;
                w.write_compressed_int(i32::from(point.start_column) - i32::from(column))?;
            }
        }
        previous_start = Some((point.start_line, point.start_column));
    }

    Ok(SequencePointsBlob {
        blob: w.to_vec(),
        single_document: if single { current } else { 0 },
    })
}

/// Import kind codes of an imports blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImportKind {
    Namespace = 1,
    AssemblyNamespace = 2,
    Type = 3,
    XmlNamespace = 4,
    AssemblyReferenceAlias = 5,
    AliasAssemblyReference = 6,
    AliasNamespace = 7,
    AliasAssemblyNamespace = 8,
    AliasType = 9,
}

/// An import with every reference already resolved to a row or coded index.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedImport<'a> {
    Namespace {
        alias: Option<&'a str>,
        assembly: Option<u32>,
        namespace: &'a str,
    },
    Type {
        alias: Option<&'a str>,
        target: CodedIndex,
    },
    XmlNamespace {
        prefix: &'a str,
        namespace: &'a str,
    },
    /// `alias` names an assembly; `assembly` is its AssemblyRef row when known.
    AssemblyAlias {
        alias: &'a str,
        assembly: Option<u32>,
    },
}

/// Encode the imports blob of an ImportScope row.
pub fn imports_blob(
    imports: &[EncodedImport<'_>],
    blobs: &mut BlobHeap,
) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    for import in imports {
        match import {
            EncodedImport::Namespace {
                alias,
                assembly,
                namespace,
            } => {
                let kind = match (alias, assembly) {
                    (None, None) => ImportKind::Namespace,
                    (None, Some(_)) => ImportKind::AssemblyNamespace,
                    (Some(_), None) => ImportKind::AliasNamespace,
                    (Some(_), Some(_)) => ImportKind::AliasAssemblyNamespace,
                };
                w.write_u8(kind as u8);
                if let Some(alias) = alias {
                    w.write_compressed_uint(blobs.add(alias.as_bytes())?)?;
                }
                if let Some(assembly) = assembly {
                    w.write_compressed_uint(*assembly)?;
                }
                w.write_compressed_uint(blobs.add(namespace.as_bytes())?)?;
            }
            EncodedImport::Type { alias, target } => {
                match alias {
                    Some(alias) => {
                        w.write_u8(ImportKind::AliasType as u8);
                        w.write_compressed_uint(blobs.add(alias.as_bytes())?)?;
                    }
                    None => w.write_u8(ImportKind::Type as u8),
                }
                w.write_compressed_uint(target.encode(CodedIndexKind::TypeDefOrRef)?)?;
            }
            EncodedImport::XmlNamespace { prefix, namespace } => {
                w.write_u8(ImportKind::XmlNamespace as u8);
                w.write_compressed_uint(blobs.add(prefix.as_bytes())?)?;
                w.write_compressed_uint(blobs.add(namespace.as_bytes())?)?;
            }
            EncodedImport::AssemblyAlias { alias, assembly } => {
                match assembly {
                    Some(_) => w.write_u8(ImportKind::AliasAssemblyReference as u8),
                    None => w.write_u8(ImportKind::AssemblyReferenceAlias as u8),
                }
                w.write_compressed_uint(blobs.add(alias.as_bytes())?)?;
                if let Some(assembly) = assembly {
                    w.write_compressed_uint(*assembly)?;
                }
            }
        }
    }
    Ok(w.to_vec())
}

/// Encode a LocalConstant signature.
///
/// `type_handle` is the compressed TypeDefOrRefOrSpec of the enum type of a primitive
/// value, or of the static type of a null reference.
pub fn local_constant_blob(value: &ConstantValue, type_handle: Option<u32>) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    match value {
        ConstantValue::Null => match type_handle {
            Some(handle) => {
                w.write_u8(ElementType::Class as u8);
                w.write_compressed_uint(handle)?;
            }
            None => w.write_u8(ElementType::Object as u8),
        },
        ConstantValue::String(_) => {
            w.write_u8(ElementType::String as u8);
            // A null string never reaches here; the value bytes follow the type code directly.
            value.write_value(&mut w)?;
        }
        value => {
            w.write_u8(value.element_type()? as u8);
            value.write_value(&mut w)?;
            if let Some(handle) = type_handle {
                w.write_compressed_uint(handle)?;
            }
        }
    }
    Ok(w.to_vec())
}

#[cfg(test)]
mod tests {
    use widestring::u16str;

    use super::*;

    fn doc(index: u32) -> DocumentId {
        let mut module = crate::model::Module::new("m");
        let mut id = None;
        for i in 0..=index {
            let d = module.add_document(crate::model::Document {
                name: format!("d{i}.cs"),
                language: language::CSHARP,
                checksum: None,
            });
            id = Some(d);
        }
        id.unwrap()
    }

    fn point(document: DocumentId, il_offset: u32, line: u32, column: u16) -> SequencePoint {
        SequencePoint {
            document,
            il_offset,
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column + 4,
        }
    }

    #[test]
    fn test_checksum_is_read_once() {
        let checksum = DocumentChecksum::spawn(HashAlgorithm::Sha256, b"abc".to_vec());
        let first = checksum.hash().unwrap().to_vec();
        assert_eq!(first.len(), 32);
        assert_eq!(checksum.hash().unwrap(), first.as_slice());
        assert_eq!(first, HashAlgorithm::Sha256.digest(b"abc"));

        let known = DocumentChecksum::precomputed(HashAlgorithm::Sha1, vec![1, 2]);
        assert_eq!(known.hash().unwrap(), &[1, 2]);
    }

    #[test]
    fn test_failed_checksum_is_an_error() {
        let handle = std::thread::spawn(|| -> Vec<u8> { panic!("hashing failed") });
        let checksum = DocumentChecksum::pending(HashAlgorithm::Sha256, handle);
        assert!(matches!(checksum.hash(), Err(Error::ChecksumFailed)));
        // The failure is cached like a successful hash.
        assert!(matches!(checksum.hash(), Err(Error::ChecksumFailed)));
    }

    #[test]
    fn test_document_name() {
        assert_eq!(document_name_separator("C:\\src\\a.cs"), b'\\');
        assert_eq!(document_name_separator("/src/a.cs"), b'/');
        assert_eq!(document_name_separator("a.cs"), 0);

        let mut blobs = BlobHeap::new();
        let blob = document_name_blob("/src/a.cs", &mut blobs).unwrap();
        // "" is the empty blob at offset 0.
        assert_eq!(blob, vec![b'/', 0x00, 0x01, 0x05]);
        assert_eq!(blobs.get(1).unwrap(), b"src");
        assert_eq!(blobs.get(5).unwrap(), b"a.cs");
    }

    #[test]
    fn test_single_document_sequence_points() {
        let d = doc(0);
        let points = [point(d, 0, 10, 5), SequencePoint::hidden(d, 3), point(d, 8, 9, 7)];
        let encoded = sequence_points_blob(0, &points, |_| Ok(1)).unwrap();
        assert_eq!(encoded.single_document, 1);
        assert_eq!(
            encoded.blob,
            vec![
                0x00, // local signature
                0x00, 0x00, 0x04, 10, 5, // first point, absolute
                0x03, 0x00, 0x00, // hidden
                0x05, 0x00, 0x04, 0x7F, 0x04, // line -1, column +2
            ]
        );
    }

    #[test]
    fn test_multiple_documents() {
        let a = doc(0);
        let b = doc(1);
        let points = [point(a, 0, 1, 1), point(b, 2, 1, 1)];
        let encoded =
            sequence_points_blob(3, &points, |d| Ok(if d == a { 1 } else { 2 })).unwrap();
        assert_eq!(encoded.single_document, 0);
        assert_eq!(
            encoded.blob,
            vec![0x03, 0x01, 0x00, 0x00, 0x04, 1, 1, 0x00, 0x02, 0x02, 0x00, 0x04, 0x00, 0x00]
        );
    }

    #[test]
    fn test_imports() {
        let mut blobs = BlobHeap::new();
        let imports = [
            EncodedImport::Namespace {
                alias: None,
                assembly: None,
                namespace: "System",
            },
            EncodedImport::AssemblyAlias {
                alias: "X",
                assembly: Some(2),
            },
        ];
        let blob = imports_blob(&imports, &mut blobs).unwrap();
        assert_eq!(blob, vec![1, 0x01, 6, 0x08, 0x02]);
    }

    #[test]
    fn test_local_constants() {
        assert_eq!(
            local_constant_blob(&ConstantValue::Int32(1), None).unwrap(),
            vec![0x08, 1, 0, 0, 0]
        );
        assert_eq!(
            local_constant_blob(&ConstantValue::Byte(2), Some(0x09)).unwrap(),
            vec![0x05, 2, 0x09]
        );
        assert_eq!(
            local_constant_blob(&ConstantValue::Null, None).unwrap(),
            vec![0x1C]
        );
        assert_eq!(
            local_constant_blob(&ConstantValue::Null, Some(0x0D)).unwrap(),
            vec![0x12, 0x0D]
        );
        assert_eq!(
            local_constant_blob(&ConstantValue::String(u16str!("a").to_owned()), None).unwrap(),
            vec![0x0E, b'a', 0]
        );
    }
}

//! GY-044: Decompression and archive extraction.
//!
//! Stream decoders read the whole input in memory. Archive extractors produce a
//! `List<File>`; directories and other non-regular entries are skipped.

use super::arg_str;
use crate::core::dish::{DishValue, FileHandle};
use crate::core::error::OpError;
use crate::core::operation::{
    ArgKind, ArgSpec, Literal, MagicCheck, OpMeta, Operation, OperationRegistryBuilder,
};
use crate::core::types::{ArgValue, TypeTag};
use flate2::read::{MultiGzDecoder, ZlibDecoder};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Read, Write};
use tracing::debug;

pub fn register(builder: &mut OperationRegistryBuilder) {
    builder
        .register(Gunzip)
        .register(Gzip)
        .register(ZlibInflate)
        .register(Bunzip2)
        .register(ZstdDecompress)
        .register(Unzip)
        .register(Untar);
}

fn read_all(mut reader: impl Read, what: &str) -> Result<Vec<u8>, OpError> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|e| OpError::operation(format!("{} failed: {}", what, e)))?;
    Ok(out)
}

const fn decoder_meta(
    name: &'static str,
    description: &'static str,
    output_type: TypeTag,
) -> OpMeta {
    OpMeta {
        name,
        module: "Compression",
        description,
        input_type: TypeTag::ArrayBuffer,
        output_type,
        presentation_type: None,
        args: &[],
        flow_control: false,
    }
}

const fn magic(pattern: &'static str, useful: bool) -> MagicCheck {
    MagicCheck {
        pattern,
        case_insensitive: false,
        args: &[],
        useful,
        entropy_range: None,
    }
}

// ============================================================================
// Stream codecs
// ============================================================================

static GUNZIP: OpMeta = decoder_meta(
    "Gunzip",
    "Decompresses data which has been compressed using the deflate algorithm with gzip headers.",
    TypeTag::ArrayBuffer,
);
static GUNZIP_CHECKS: &[MagicCheck] = &[magic(r"^\x1f\x8b\x08", false)];

pub struct Gunzip;

impl Operation for Gunzip {
    fn meta(&self) -> &'static OpMeta {
        &GUNZIP
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        Ok(DishValue::ArrayBuffer(read_all(
            MultiGzDecoder::new(bytes.as_slice()),
            "Gunzip",
        )?))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        GUNZIP_CHECKS
    }
}

const GZIP_LEVELS: &[&str] = &["Dynamic Huffman Coding", "Fixed Huffman Coding", "None (Store)"];

static GZIP: OpMeta = OpMeta {
    name: "Gzip",
    module: "Compression",
    description: "Compresses data using the deflate algorithm with gzip headers.",
    input_type: TypeTag::ArrayBuffer,
    output_type: TypeTag::ArrayBuffer,
    presentation_type: None,
    args: &[ArgSpec {
        name: "Compression type",
        kind: ArgKind::Option(GZIP_LEVELS),
        default: Literal::Str("Dynamic Huffman Coding"),
    }],
    flow_control: false,
};

pub struct Gzip;

impl Operation for Gzip {
    fn meta(&self) -> &'static OpMeta {
        &GZIP
    }

    fn run(&self, input: DishValue, args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let level = match arg_str(args, 0).as_str() {
            "None (Store)" => Compression::none(),
            "Fixed Huffman Coding" => Compression::fast(),
            _ => Compression::default(),
        };
        let mut encoder = GzEncoder::new(Vec::new(), level);
        encoder
            .write_all(&bytes)
            .and_then(|_| encoder.finish())
            .map(DishValue::ArrayBuffer)
            .map_err(|e| OpError::operation(format!("Gzip failed: {}", e)))
    }
}

static ZLIB_INFLATE: OpMeta = decoder_meta(
    "Zlib Inflate",
    "Decompresses data which has been compressed using the deflate algorithm with zlib headers.",
    TypeTag::ArrayBuffer,
);
static ZLIB_CHECKS: &[MagicCheck] = &[magic(r"^\x78(?:\x01|\x5e|\x9c|\xda)", false)];

pub struct ZlibInflate;

impl Operation for ZlibInflate {
    fn meta(&self) -> &'static OpMeta {
        &ZLIB_INFLATE
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        Ok(DishValue::ArrayBuffer(read_all(
            ZlibDecoder::new(bytes.as_slice()),
            "Zlib Inflate",
        )?))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        ZLIB_CHECKS
    }
}

static BUNZIP2: OpMeta = decoder_meta(
    "Bunzip2",
    "Decompresses data using the Bzip2 algorithm.",
    TypeTag::ArrayBuffer,
);
static BUNZIP2_CHECKS: &[MagicCheck] = &[magic(r"^\x42\x5a\x68", false)];

pub struct Bunzip2;

impl Operation for Bunzip2 {
    fn meta(&self) -> &'static OpMeta {
        &BUNZIP2
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        Ok(DishValue::ArrayBuffer(read_all(
            bzip2::read::MultiBzDecoder::new(bytes.as_slice()),
            "Bunzip2",
        )?))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        BUNZIP2_CHECKS
    }
}

static ZSTD_DECOMPRESS: OpMeta = decoder_meta(
    "Zstandard Decompress",
    "Decompresses data using the Zstandard algorithm.",
    TypeTag::ArrayBuffer,
);
static ZSTD_CHECKS: &[MagicCheck] = &[magic(r"^\x28\xb5\x2f\xfd", false)];

pub struct ZstdDecompress;

impl Operation for ZstdDecompress {
    fn meta(&self) -> &'static OpMeta {
        &ZSTD_DECOMPRESS
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        zstd::stream::decode_all(bytes.as_slice())
            .map(DishValue::ArrayBuffer)
            .map_err(|e| OpError::operation(format!("Zstandard Decompress failed: {}", e)))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        ZSTD_CHECKS
    }
}

// ============================================================================
// Archives
// ============================================================================

static UNZIP: OpMeta = decoder_meta(
    "Unzip",
    "Decompresses data using the PKZIP algorithm and displays it per file.",
    TypeTag::ListFile,
);
static UNZIP_CHECKS: &[MagicCheck] =
    &[magic(r"^\x50\x4b(?:\x03|\x05|\x07)(?:\x04|\x06|\x08)", true)];

pub struct Unzip;

impl Operation for Unzip {
    fn meta(&self) -> &'static OpMeta {
        &UNZIP
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let zip_err = |e: zip::result::ZipError| OpError::operation(format!("Unzip failed: {}", e));
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(zip_err)?;
        let mut files = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(zip_err)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let data = read_all(&mut entry, "Unzip")?;
            debug!("Unzip: {} ({} bytes)", name, data.len());
            files.push(FileHandle::new(&name, data));
        }
        Ok(DishValue::ListFile(files))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        UNZIP_CHECKS
    }
}

static UNTAR: OpMeta = decoder_meta(
    "Untar",
    "Unpacks a tarball and displays it per file.",
    TypeTag::ListFile,
);
static UNTAR_CHECKS: &[MagicCheck] = &[magic(r"(?s)^.{257}\x75\x73\x74\x61\x72", true)];

pub struct Untar;

impl Operation for Untar {
    fn meta(&self) -> &'static OpMeta {
        &UNTAR
    }

    fn run(&self, input: DishValue, _args: &[ArgValue]) -> Result<DishValue, OpError> {
        let bytes = input.into_bytes()?;
        let tar_err = |e: std::io::Error| OpError::operation(format!("Untar failed: {}", e));
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        let mut files = Vec::new();
        for entry in archive.entries().map_err(tar_err)? {
            let mut entry = entry.map_err(tar_err)?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path().map_err(tar_err)?.to_string_lossy().to_string();
            let mtime = entry.header().mtime().ok();
            let data = read_all(&mut entry, "Untar")?;
            let mut file = FileHandle::new(&name, data);
            file.last_modified = mtime;
            files.push(file);
        }
        Ok(DishValue::ListFile(files))
    }

    fn magic_checks(&self) -> &'static [MagicCheck] {
        UNTAR_CHECKS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dish::Dish;
    use crate::core::testkit::{self, op};
    use flate2::write::ZlibEncoder;

    fn run_bytes(input: Vec<u8>, name: &str) -> DishValue {
        let registry = testkit::registry();
        let op = registry.get(name).unwrap();
        op.run(DishValue::ArrayBuffer(input), &op.meta().default_args())
            .unwrap()
    }

    #[test]
    fn test_gy044_gzip_roundtrip_through_recipe() {
        let out = testkit::run_to_string("hello hello hello", &[op("Gzip", vec![]), op("Gunzip", vec![])]);
        assert_eq!(out, "hello hello hello");
    }

    #[test]
    fn test_gy044_zlib_inflate() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"zlib data").unwrap();
        let packed = enc.finish().unwrap();
        assert_eq!(packed[0], 0x78);
        assert_eq!(run_bytes(packed, "Zlib Inflate"), DishValue::ArrayBuffer(b"zlib data".to_vec()));
    }

    #[test]
    fn test_gy044_bunzip2() {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        enc.write_all(b"bzip2 data").unwrap();
        let packed = enc.finish().unwrap();
        assert_eq!(run_bytes(packed, "Bunzip2"), DishValue::ArrayBuffer(b"bzip2 data".to_vec()));
    }

    #[test]
    fn test_gy044_zstd() {
        let packed = zstd::stream::encode_all(&b"zstd data"[..], 3).unwrap();
        assert_eq!(
            run_bytes(packed, "Zstandard Decompress"),
            DishValue::ArrayBuffer(b"zstd data".to_vec())
        );
    }

    #[test]
    fn test_gy044_unzip_lists_files() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let opts = zip::write::SimpleFileOptions::default();
            zip.add_directory("dir/", opts).unwrap();
            zip.start_file("dir/a.txt", opts).unwrap();
            zip.write_all(b"alpha").unwrap();
            zip.start_file("b.txt", opts).unwrap();
            zip.write_all(b"beta").unwrap();
            zip.finish().unwrap();
        }
        let files = run_bytes(buf.into_inner(), "Unzip").into_files().unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["dir/a.txt", "b.txt"]);
        assert_eq!(files[1].read_bytes().unwrap(), b"beta");
    }

    #[test]
    fn test_gy044_untar_lists_files() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_ustar();
        header.set_size(5);
        header.set_mode(0o644);
        header.set_mtime(1_700_000_000);
        header.set_cksum();
        builder.append_data(&mut header, "notes.txt", &b"hello"[..]).unwrap();
        let packed = builder.into_inner().unwrap();

        let files = run_bytes(packed, "Untar").into_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "notes.txt");
        assert_eq!(files[0].last_modified, Some(1_700_000_000));

        let mut dish = Dish::new(DishValue::ListFile(files));
        assert_eq!(dish.get_string().unwrap(), "hello");
    }

    #[test]
    fn test_gy044_corrupt_input_is_recovered() {
        let (mut state, result) = testkit::run("not gzip", &[op("Gunzip", vec![])]);
        assert_eq!(result.unwrap(), 0);
        assert!(state.dish.get_string().unwrap().starts_with("Gunzip failed"));
    }
}

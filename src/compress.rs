use deflate::write::GzEncoder;
use deflate::Compression;
use libflate::gzip::Decoder as GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

pub type GzWriter = GzEncoder<BufWriter<File>>;

/// Creates `path`, returning a writer which gzip-compresses everything written to it.
pub fn gzip_writer(path: &Path) -> io::Result<GzWriter> {
    File::create(path).map(|file| GzEncoder::new(BufWriter::new(file), Compression::Best))
}

/// Writes the gzip trailer and flushes the file underneath.
pub fn gzip_finish(writer: GzWriter) -> io::Result<()> {
    writer.finish().and_then(|mut file| file.flush())
}

pub fn gzip_reader(path: &Path) -> io::Result<GzDecoder<BufReader<File>>> {
    File::open(path).and_then(|file| GzDecoder::new(BufReader::new(file)))
}

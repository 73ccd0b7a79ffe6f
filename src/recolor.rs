use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use camino::Utf8Path;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::SegwayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    red: u8,
    green: u8,
    blue: u8,
}

impl Rgb {
    pub fn new(red: i64, green: i64, blue: i64) -> Result<Self, SegwayError> {
        Ok(Self {
            red: channel(red)?,
            green: channel(green)?,
            blue: channel(blue)?,
        })
    }

    const fn from_channels(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }
}

fn channel(value: i64) -> Result<u8, SegwayError> {
    u8::try_from(value).map_err(|_| SegwayError::InvalidColor(value))
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.red, self.green, self.blue)
    }
}

// Roadmap chromatin-state palette.
pub const DARK_KHAKI: Rgb = Rgb::from_channels(189, 183, 107);
pub const GREEN: Rgb = Rgb::from_channels(0, 128, 0);
pub const ORANGE: Rgb = Rgb::from_channels(255, 195, 77);
pub const PALE_TURQUOISE: Rgb = Rgb::from_channels(138, 145, 208);
pub const PURPLE: Rgb = Rgb::from_channels(128, 0, 128);
pub const RED: Rgb = Rgb::from_channels(255, 0, 0);
pub const SILVER: Rgb = Rgb::from_channels(128, 128, 128);
pub const WHITE: Rgb = Rgb::from_channels(255, 255, 255);
pub const YELLOW: Rgb = Rgb::from_channels(255, 255, 0);

pub type ColorTable = BTreeMap<String, Rgb>;

pub fn default_color_table() -> ColorTable {
    [
        ("Bivalent", DARK_KHAKI),
        ("ConstitutiveHet", PALE_TURQUOISE),
        ("Enhancer", ORANGE),
        ("FacultativeHet", PURPLE),
        ("LowConfidence", SILVER),
        ("Promoter", RED),
        ("Quiescent", WHITE),
        ("RegPermissive", YELLOW),
        ("Transcribed", GREEN),
    ]
    .into_iter()
    .map(|(label, color)| (label.to_string(), color))
    .collect()
}

/// Copies the track line through untouched, then rewrites the last column of every
/// row with the color of its label (fourth column).
pub fn recolor_bed<R: BufRead, W: Write>(
    input: R,
    mut output: W,
    table: &ColorTable,
) -> Result<(), SegwayError> {
    let mut lines = input.lines();
    if let Some(header) = lines.next() {
        let header = header.map_err(|err| SegwayError::Filesystem(err.to_string()))?;
        writeln!(output, "{header}").map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    }
    for (index, line) in lines.enumerate() {
        let line = line.map_err(|err| SegwayError::Filesystem(err.to_string()))?;
        if line.is_empty() {
            continue;
        }
        let row = recolor_row(&line, index + 2, table)?;
        writeln!(output, "{row}").map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    }
    output
        .flush()
        .map_err(|err| SegwayError::Filesystem(err.to_string()))
}

fn recolor_row(line: &str, line_number: usize, table: &ColorTable) -> Result<String, SegwayError> {
    let mut fields = line.split('\t').collect::<Vec<_>>();
    if fields.len() < 4 {
        return Err(SegwayError::BedFormat {
            line: line_number,
            message: format!("expected at least 4 columns, found {}", fields.len()),
        });
    }
    let label = fields[3];
    let color = table
        .get(label)
        .ok_or_else(|| SegwayError::UnknownLabel(label.to_string()))?
        .to_string();
    if let Some(last) = fields.last_mut() {
        *last = color.as_str();
    }
    Ok(fields.join("\t"))
}

pub fn recolor_bed_file(
    input: &Utf8Path,
    output: &Utf8Path,
    table: &ColorTable,
) -> Result<(), SegwayError> {
    let source = File::open(input.as_std_path())
        .map_err(|err| SegwayError::Filesystem(format!("open {input}: {err}")))?;
    let reader: Box<dyn Read> = if is_gzip(input) {
        Box::new(MultiGzDecoder::new(source))
    } else {
        Box::new(source)
    };
    let sink = File::create(output.as_std_path())
        .map_err(|err| SegwayError::Filesystem(format!("create {output}: {err}")))?;
    if is_gzip(output) {
        let mut encoder = GzEncoder::new(BufWriter::new(sink), Compression::default());
        recolor_bed(BufReader::new(reader), &mut encoder, table)?;
        encoder
            .finish()
            .and_then(|mut writer| writer.flush())
            .map_err(|err| SegwayError::Filesystem(err.to_string()))
    } else {
        recolor_bed(BufReader::new(reader), BufWriter::new(sink), table)
    }
}

fn is_gzip(path: &Utf8Path) -> bool {
    path.extension() == Some("gz")
}

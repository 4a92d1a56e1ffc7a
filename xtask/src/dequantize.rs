use crate::{LogArgs, ERR, YES};
use ggml_dequant::{GGmlType, GGmlTypeError, GGmlTypeSize, InvalidLength};
use log::{debug, error, info, warn};
use memmap2::Mmap;
use std::{fmt, fs, fs::File, io, path::PathBuf, time::Instant};

#[derive(Args, Default)]
pub struct DequantizeArgs {
    /// File holding the encoded blocks
    input: PathBuf,
    /// Element type of the blocks, such as "q4_0" or "q6_k"
    #[clap(long = "type", short = 't')]
    ty: String,
    /// Write the decoded values to this file as little-endian f32
    #[clap(long, short)]
    output: Option<PathBuf>,
    /// Number of elements to decode, every whole block by default
    #[clap(long, short = 'n')]
    elements: Option<usize>,
    /// Bytes to skip before the first block
    #[clap(long, default_value_t = 0)]
    offset: usize,
    /// Decode blocks on the rayon pool
    #[clap(long)]
    parallel: bool,
    /// Number of values to print when no output file is given
    #[clap(long, default_value_t = 16)]
    head: usize,

    #[clap(flatten)]
    log: LogArgs,
}

enum DequantizeError {
    Io(io::Error),
    Type(GGmlTypeError),
    Length(InvalidLength),
    Offset { offset: usize, len: usize },
}

impl From<io::Error> for DequantizeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<GGmlTypeError> for DequantizeError {
    fn from(e: GGmlTypeError) -> Self {
        Self::Type(e)
    }
}

impl From<InvalidLength> for DequantizeError {
    fn from(e: InvalidLength) -> Self {
        Self::Length(e)
    }
}

impl fmt::Display for DequantizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Type(e) => write!(f, "{e}"),
            Self::Length(e) => write!(f, "invalid length: {e}"),
            Self::Offset { offset, len } => {
                write!(f, "offset {offset} is beyond the end of a {len} bytes file")
            }
        }
    }
}

impl DequantizeArgs {
    pub fn dequantize(self) {
        let Self {
            input,
            ty,
            output,
            elements,
            offset,
            parallel,
            head,
            log,
        } = self;
        log.init();

        let job = Job {
            input,
            ty,
            elements,
            offset,
            parallel,
        };
        let values = match job.run() {
            Ok(values) => values,
            Err(e) => {
                error!("{e}");
                println!("{ERR}{e}");
                std::process::exit(1)
            }
        };

        match output {
            Some(path) => {
                let mut bytes = Vec::with_capacity(values.len() * size_of::<f32>());
                for x in &values {
                    bytes.extend_from_slice(&x.to_le_bytes())
                }
                if let Err(e) = fs::write(&path, bytes) {
                    error!("failed to write {}: {e}", path.display());
                    println!("{ERR}{e}");
                    std::process::exit(1)
                }
                println!("{YES}{} values written to {}", values.len(), path.display());
            }
            None => {
                for (i, x) in values.iter().take(head).enumerate() {
                    println!("{i:>8}: {x:?}")
                }
                if values.len() > head {
                    println!("     ...: {} more", values.len() - head)
                }
            }
        }
    }
}

struct Job {
    input: PathBuf,
    ty: String,
    elements: Option<usize>,
    offset: usize,
    parallel: bool,
}

impl Job {
    fn run(self) -> Result<Vec<f32>, DequantizeError> {
        let ty = self.ty.parse::<GGmlType>()?;
        let file = File::open(&self.input)?;
        let file = unsafe { Mmap::map(&file) }?;
        let data = file.get(self.offset..).ok_or(DequantizeError::Offset {
            offset: self.offset,
            len: file.len(),
        })?;

        let GGmlTypeSize {
            block_size,
            type_size,
        } = ty.size();
        let elements = match self.elements {
            Some(n) => n,
            None => {
                let tail = data.len() % type_size as usize;
                if tail != 0 {
                    warn!("{tail} trailing bytes do not form a whole {ty} block");
                }
                data.len() / type_size as usize * block_size as usize
            }
        };
        let nbytes = ty.nbytes(elements)?;
        let data = data.get(..nbytes).ok_or(InvalidLength::ByteCount {
            expected: nbytes,
            found: data.len(),
        })?;
        info!(
            "decode {elements} {ty} elements from {} bytes of {}",
            nbytes,
            self.input.display()
        );

        let mut values = vec![0.; elements];
        let time = Instant::now();
        if self.parallel {
            ty.par_dequantize(data, &mut values)?
        } else {
            ty.dequantize(data, &mut values)?
        }
        debug!("decoded in {:?}", time.elapsed());
        Ok(values)
    }
}

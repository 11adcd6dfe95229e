//! Program images and the commands that rewrite memory wholesale: Load
//! Default, Load Test, Clear Memory and Reset CPU, plus the vector fields.
use crate::control::Machine;
use crate::cpu::{ADC_IMM, JMP_ABS, JMP_IND, LDA_IMM, NOP};
use crate::engine::Engine;
use crate::error::LoadError;
use crate::memory::{MemoryMap, ADDRESS_SPACE_LEN};
use crate::vectors::{Vector, VectorSet};
use log::{info, warn};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// where Load Test points the reset vector
pub const TEST_ENTRY_ADDR: u16 = 0x0400;

pub const DEFAULT_TEST_IMAGE: &str = "test/6502_functional_test.bin";

/// The demo program installed by Load Default, as (address, bytes) runs.
///  8000 LDA #$00
///  8002 NOP
///  8003 JMP ($9000)   -> A000
///  A000 ADC #$09
///  A002 ADC #$05
///  A004 JMP $8002
pub const DEMO_PROGRAM: [(u16, &[u8]); 3] = [
    (0x8000, &[LDA_IMM, 0x00, NOP, JMP_IND, 0x00, 0x90]),
    (0x9000, &[0x00, 0xa0]),
    (0xa000, &[ADC_IMM, 0x09, ADC_IMM, 0x05, JMP_ABS, 0x02, 0x80]),
];

/// A full 64K memory image, read completely before anything is applied.
pub struct LoadedImage {
    bytes: Vec<u8>,
}

impl LoadedImage {
    /// read an image whose source claims to be `declared_len` bytes long
    pub fn read_from(reader: &mut impl Read, declared_len: u64) -> Result<Self, LoadError> {
        if declared_len != ADDRESS_SPACE_LEN as u64 {
            return Err(LoadError::WrongSize {
                actual: declared_len,
                expected: ADDRESS_SPACE_LEN,
            });
        }
        let mut bytes = Vec::with_capacity(ADDRESS_SPACE_LEN);
        reader
            .take(ADDRESS_SPACE_LEN as u64)
            .read_to_end(&mut bytes)?;
        if bytes.len() != ADDRESS_SPACE_LEN {
            return Err(LoadError::ShortRead {
                read: bytes.len(),
                expected: ADDRESS_SPACE_LEN,
            });
        }
        Ok(LoadedImage { bytes })
    }

    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let open_err = |source: io::Error| LoadError::Open {
            path: path.to_path_buf(),
            source,
        };
        let mut f = File::open(path).map_err(open_err)?;
        let len = f.metadata().map_err(open_err)?.len();
        Self::read_from(&mut f, len)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Keeps the vector fields and their memory mirrors consistent and applies
/// the memory-wide commands.
pub struct ProgramManager {
    vectors: VectorSet,
    test_image: PathBuf,
}

impl ProgramManager {
    pub fn new(test_image: impl Into<PathBuf>) -> Self {
        ProgramManager {
            vectors: VectorSet::default(),
            test_image: test_image.into(),
        }
    }

    pub fn vectors(&self) -> &VectorSet {
        &self.vectors
    }

    pub fn test_image(&self) -> &Path {
        &self.test_image
    }

    /// Restore the default vectors and install the demo program. Only the
    /// vector mirrors and the demo bytes are written.
    pub fn load_default<E: Engine>(&mut self, machine: &Machine<E>) {
        machine.control.arm_stepping();
        let vectors = &mut self.vectors;
        let applied = machine.edit(|st| {
            vectors.restore_defaults(&mut st.mem);
            for (addr, code) in DEMO_PROGRAM {
                st.mem.get_rw_slice(addr, code.len()).copy_from_slice(code);
            }
        });
        if applied.is_none() {
            warn!("load default refused: execution is running");
        }
    }

    /// Load the configured test image. On any failure memory, vectors and
    /// execution state are left as they were.
    pub fn load_test<E: Engine>(&mut self, machine: &Machine<E>) -> Result<(), LoadError> {
        let image = match LoadedImage::open(&self.test_image) {
            Ok(image) => image,
            Err(e) => {
                warn!("load test: {}", e);
                return Err(e);
            }
        };
        self.apply_image(machine, &image);
        info!(
            "binary image {} read OK, setting reset vector to 0x{:04X}",
            self.test_image.display(),
            TEST_ENTRY_ADDR
        );
        Ok(())
    }

    /// Apply a full image, point reset at the test entry and take NMI and
    /// IRQ from the image's own mirror bytes.
    pub fn apply_image<E: Engine>(&mut self, machine: &Machine<E>, image: &LoadedImage) {
        machine.control.arm_stepping();
        let vectors = &mut self.vectors;
        machine.edit(|st| {
            st.mem.load_image(image.as_bytes());
            vectors.set(Vector::Reset, TEST_ENTRY_ADDR, &mut st.mem);
            vectors.reload(Vector::Nmi, &st.mem);
            vectors.reload(Vector::Irq, &st.mem);
        });
    }

    /// zero every byte; the vector fields keep their values
    pub fn clear_memory<E: Engine>(&mut self, machine: &Machine<E>) {
        machine.control.halt();
        machine.edit(|st| st.mem.fill(0));
    }

    /// back to idle stepping, counter zeroed, engine reset from the reset
    /// vector mirror
    pub fn reset_cpu<E: Engine>(&mut self, machine: &Machine<E>) {
        machine.reset();
    }

    /// Apply text typed into a vector field. Execution is frozen first; the
    /// stored value (possibly the default) is returned.
    pub fn edit_vector<E: Engine>(
        &mut self,
        machine: &Machine<E>,
        v: Vector,
        input: &str,
    ) -> Option<u16> {
        if !machine.control.freeze() {
            return None;
        }
        let vectors = &mut self.vectors;
        machine.edit(|st| vectors.set_from_text(v, input, &mut st.mem))
    }
}

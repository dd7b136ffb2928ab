//! # Constants
//!
//! Residue and atom tables shared by the featurizers.
//!
//! ## Residue Order
//! Two residue orders are in play:
//!
//! - the network order `ARNDCQEGHILKMFPSTWYV` (+ `X`), used by `aatype`
//! - the HHblits order `ACDEFGHIKLMNPQRSTVWY` (+ `X`, `-`), used by MSA rows
//!
//! [`MAP_HHBLITS_AATYPE_TO_OUR_AATYPE`] converts between the two.
//!
//! ## Atom Order
//! Atoms follow the 37-slot `atom37` layout. See [`AAAtom`].
//!
use ndarray::Array2;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Number of atom slots per residue in the atom37 layout.
pub const ATOM_TYPE_NUM: usize = 37;

/// Number of standard residue types (without `X`).
pub const RESTYPE_NUM: usize = 20;

/// Index of `X` in the network order.
pub const UNKNOWN_RESTYPE: usize = 20;

/// Index of the gap symbol in the HHblits order.
pub const MSA_GAP_IDX: i64 = 21;

/// Number of HHblits classes (20 residues, `X`, gap).
pub const HHBLITS_CLASSES: usize = 22;

/// Chain identifiers handed out to chain copies, in order.
pub const PDB_CHAIN_IDS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// `MAP_HHBLITS_AATYPE_TO_OUR_AATYPE[hhblits_idx] == network_idx`
pub const MAP_HHBLITS_AATYPE_TO_OUR_AATYPE: [i64; HHBLITS_CLASSES] = [
    0, 4, 3, 6, 13, 7, 8, 9, 11, 10, 12, 2, 14, 5, 1, 15, 16, 19, 17, 18, 20, 21,
];

#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum AAAtom {
    N = 0,    CA = 1,   C = 2,    CB = 3,   O = 4,
    CG = 5,   CG1 = 6,  CG2 = 7,  OG = 8,   OG1 = 9,
    SG = 10,  CD = 11,  CD1 = 12, CD2 = 13, ND1 = 14,
    ND2 = 15, OD1 = 16, OD2 = 17, SD = 18,  CE = 19,
    CE1 = 20, CE2 = 21, CE3 = 22, NE = 23,  NE1 = 24,
    NE2 = 25, OE1 = 26, OE2 = 27, CH2 = 28, NH1 = 29,
    NH2 = 30, OH = 31,  CZ = 32,  CZ2 = 33, CZ3 = 34,
    NZ = 35,  OXT = 36,
    Unknown = -1,
}

impl AAAtom {
    /// Slot of the atom in the atom37 layout. `None` for `Unknown`.
    pub fn to_index(&self) -> Option<usize> {
        match self {
            AAAtom::Unknown => None,
            atom => Some(*atom as usize),
        }
    }

    /// Look an atom up by its PDB atom name (`"CA"`, `"OXT"` ...).
    pub fn from_name(name: &str) -> Self {
        name.trim().parse().unwrap_or(AAAtom::Unknown)
    }

    /// Iterate the 37 real atom slots in order.
    pub fn atom37() -> impl Iterator<Item = AAAtom> {
        AAAtom::iter().filter(|&a| a != AAAtom::Unknown)
    }
}

macro_rules! define_residues {
    ($($name:ident: $code3:expr, $code1:expr, $idx:expr, $atoms14:expr),* $(,)?) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum Residue {
            $($name),*
        }

        impl Residue {
            pub const fn code3(&self) -> &'static str {
                match self {
                    $(Self::$name => $code3),*
                }
            }
            pub const fn code1(&self) -> char {
                match self {
                    $(Self::$name => $code1),*
                }
            }
            pub const fn atoms14(&self) -> [AAAtom; 14] {
                match self {
                    $(Self::$name => $atoms14),*
                }
            }
            /// Residue at `value` in the network order; anything else is `UNK`.
            pub fn from_int(value: usize) -> Self {
                match value {
                    $($idx => Self::$name,)*
                    _ => Self::UNK
                }
            }
            /// Index in the network order.
            pub const fn to_int(&self) -> usize {
                match self {
                    $(Self::$name => $idx),*
                }
            }
            pub fn from_code1(code: char) -> Self {
                match code {
                    $($code1 => Self::$name,)*
                    _ => Self::UNK
                }
            }
            /// `None` for anything that is not one of the 20 standard residues.
            pub fn from_code3(code: &str) -> Option<Self> {
                let residue = match code {
                    $($code3 => Self::$name,)*
                    _ => return None
                };
                (residue != Self::UNK).then_some(residue)
            }
        }
    }
}

use AAAtom::Unknown as U;

// network order: ARNDCQEGHILKMFPSTWYV
define_residues! {
    ALA: "ALA", 'A', 0,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, U, U, U, U, U, U, U, U, U],
    ARG: "ARG", 'R', 1,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD, AAAtom::NE, AAAtom::CZ, AAAtom::NH1, AAAtom::NH2, U, U, U],
    ASN: "ASN", 'N', 2,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::OD1, AAAtom::ND2, U, U, U, U, U, U],
    ASP: "ASP", 'D', 3,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::OD1, AAAtom::OD2, U, U, U, U, U, U],
    CYS: "CYS", 'C', 4,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::SG, U, U, U, U, U, U, U, U],
    GLN: "GLN", 'Q', 5,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD, AAAtom::OE1, AAAtom::NE2, U, U, U, U, U],
    GLU: "GLU", 'E', 6,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD, AAAtom::OE1, AAAtom::OE2, U, U, U, U, U],
    GLY: "GLY", 'G', 7,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, U, U, U, U, U, U, U, U, U, U],
    HIS: "HIS", 'H', 8,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::ND1, AAAtom::CD2, AAAtom::CE1, AAAtom::NE2, U, U, U, U],
    ILE: "ILE", 'I', 9,  [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG1, AAAtom::CG2, AAAtom::CD1, U, U, U, U, U, U],
    LEU: "LEU", 'L', 10, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD1, AAAtom::CD2, U, U, U, U, U, U],
    LYS: "LYS", 'K', 11, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD, AAAtom::CE, AAAtom::NZ, U, U, U, U, U],
    MET: "MET", 'M', 12, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::SD, AAAtom::CE, U, U, U, U, U, U],
    PHE: "PHE", 'F', 13, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD1, AAAtom::CD2, AAAtom::CE1, AAAtom::CE2, AAAtom::CZ, U, U, U],
    PRO: "PRO", 'P', 14, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD, U, U, U, U, U, U, U],
    SER: "SER", 'S', 15, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::OG, U, U, U, U, U, U, U, U],
    THR: "THR", 'T', 16, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::OG1, AAAtom::CG2, U, U, U, U, U, U, U],
    TRP: "TRP", 'W', 17, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD1, AAAtom::CD2, AAAtom::CE2, AAAtom::CE3, AAAtom::NE1, AAAtom::CZ2, AAAtom::CZ3, AAAtom::CH2],
    TYR: "TYR", 'Y', 18, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG, AAAtom::CD1, AAAtom::CD2, AAAtom::CE1, AAAtom::CE2, AAAtom::CZ, AAAtom::OH, U, U],
    VAL: "VAL", 'V', 19, [AAAtom::N, AAAtom::CA, AAAtom::C, AAAtom::O, AAAtom::CB, AAAtom::CG1, AAAtom::CG2, U, U, U, U, U, U, U],
    UNK: "UNK", 'X', 20, [U, U, U, U, U, U, U, U, U, U, U, U, U, U],
}

#[rustfmt::skip]
/// Residue letter to HHblits class, `None` for letters HHblits does not know.
///
/// Ambiguity codes fold onto their closest residue (`B`→`D`, `Z`→`E`, `U`→`C`).
pub fn hhblits_aa_to_id(aa: char) -> Option<usize> {
    let id = match aa {
        'A' => 0,  'B' => 2,  'C' => 1,  'D' => 2,
        'E' => 3,  'F' => 4,  'G' => 5,  'H' => 6,
        'I' => 7,  'J' => 20, 'K' => 8,  'L' => 9,
        'M' => 10, 'N' => 11, 'O' => 20, 'P' => 12,
        'Q' => 13, 'R' => 14, 'S' => 15, 'T' => 16,
        'U' => 1,  'V' => 17, 'W' => 18, 'X' => 20,
        'Y' => 19, 'Z' => 3,  '-' => 21,
        _ => return None,
    };
    Some(id)
}

/// Network-order index for a residue letter, unknown letters map to `X`.
pub fn restype_order_with_x(aa: char) -> usize {
    Residue::from_code1(aa).to_int()
}

/// Atom37 presence mask for a residue type in the network order.
///
/// `OXT` is never set, and `X` has no atoms.
pub fn standard_atom_mask(restype: usize) -> [f32; ATOM_TYPE_NUM] {
    let mut mask = [0f32; ATOM_TYPE_NUM];
    for atom in Residue::from_int(restype).atoms14() {
        if let Some(idx) = atom.to_index() {
            mask[idx] = 1.0;
        }
    }
    mask
}

/// One-hot encode `sequence` into a `[len, num_classes]` matrix.
///
/// `mapping` returns the class of a residue or `None` when it is unknown;
/// unknown residues fall back to `unknown` when given and are left as an
/// all-zero row otherwise.
pub fn sequence_to_onehot<F>(
    sequence: &str,
    mapping: F,
    num_classes: usize,
    unknown: Option<usize>,
) -> Array2<i64>
where
    F: Fn(char) -> Option<usize>,
{
    let n = sequence.chars().count();
    let mut onehot = Array2::<i64>::zeros((n, num_classes));
    for (i, aa) in sequence.chars().enumerate() {
        if let Some(class) = mapping(aa).or(unknown).filter(|c| *c < num_classes) {
            onehot[[i, class]] = 1;
        }
    }
    onehot
}

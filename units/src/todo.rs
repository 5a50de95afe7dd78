/// Units which are simply type aliases for `f64` rather than having an
/// implementation as a `uom` `Quantity`.
///
/// This may be because:
///
/// + They live inside `ndarray` arrays, where `uom` quantities get in the way
///   of the numerical code.
///
/// + They are clinical conventions (MBq, fractions of administered activity)
///   which are read from and written to forms as plain numbers.

pub type Ratef64     = f64; // counts per second; TODO uom Frequency
pub type Activityf64 = f64; // MBq
pub type Uptakef64   = f64; // fraction of administered activity
pub type DeadTimef64 = f64; // seconds

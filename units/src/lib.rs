pub mod todo;

pub use uom::si::Quantity;
pub use uom::si::f64::{Time, Mass, Volume, MassDensity, Ratio};

mod units {
  pub use uom::si::{time        ::{millisecond, second, hour, day},
                    mass        ::gram,
                    volume      ::milliliter,
                    mass_density::gram_per_cubic_centimeter,
                    ratio       ::ratio,
  };
}
// Making values from float literals is very long-winded, so provide some
// pithily-named convenience constructors.

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f64) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(ms    Time                    millisecond);
wrap!(s     Time                         second);
wrap!(hr    Time                           hour);
wrap!(day   Time                            day);
wrap!(g     Mass                           gram);
wrap!(ml    Volume                   milliliter);
wrap!(g_ml  MassDensity gram_per_cubic_centimeter);
wrap!(ratio Ratio                         ratio);

// Reverse direction of the above
pub fn ms_ (x: Time  ) -> f64 { x.get::<units::millisecond>() }
pub fn s_  (x: Time  ) -> f64 { x.get::<units::second>() }
pub fn hr_ (x: Time  ) -> f64 { x.get::<units::hour>() }
pub fn day_(x: Time  ) -> f64 { x.get::<units::day>() }
pub fn g_  (x: Mass  ) -> f64 { x.get::<units::gram>() }
pub fn ml_ (x: Volume) -> f64 { x.get::<units::milliliter>() }

pub fn g_ml_ (x: MassDensity) -> f64 { x.get::<units::gram_per_cubic_centimeter>() }
pub fn ratio_(x: Ratio      ) -> f64 { x.get::<units::ratio>() }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}

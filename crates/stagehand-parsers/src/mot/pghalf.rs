//! 16-bit float used by the quantised key encodings
//!
//! Layout: 1 sign bit, 6 exponent bits (bias 47), 9 mantissa bits.

const EXPONENT_BIAS: i32 = 47;
const MANTISSA_BITS: u32 = 9;
const MANTISSA_MASK: u16 = (1 << MANTISSA_BITS) - 1;
const EXPONENT_MASK: u16 = 0x3F;

pub fn decode(raw: u16) -> f32 {
    let sign = if raw & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = i32::from((raw >> MANTISSA_BITS) & EXPONENT_MASK);
    let mantissa = f32::from(raw & MANTISSA_MASK) / (1 << MANTISSA_BITS) as f32;

    if exponent == 0 {
        if mantissa == 0.0 {
            return 0.0 * sign;
        }
        return sign * mantissa * 2f32.powi(1 - EXPONENT_BIAS);
    }
    sign * (1.0 + mantissa) * 2f32.powi(exponent - EXPONENT_BIAS)
}

/// Nearest representable value; tiny values flush to zero, huge ones saturate
pub fn encode(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    if value == 0.0 || value.is_nan() {
        return sign;
    }

    let mut exponent = ((bits >> 23) & 0xFF) as i32 - 127 + EXPONENT_BIAS;
    // Round the 23-bit mantissa to 9 bits
    let mut mantissa = ((bits & 0x7F_FFFF) + (1 << 13)) >> 14;
    if mantissa > u32::from(MANTISSA_MASK) {
        mantissa = 0;
        exponent += 1;
    }

    if exponent <= 0 {
        return sign;
    }
    if exponent >= i32::from(EXPONENT_MASK) || value.is_infinite() {
        return sign | (EXPONENT_MASK << MANTISSA_BITS) | MANTISSA_MASK;
    }
    sign | ((exponent as u16) << MANTISSA_BITS) | mantissa as u16
}

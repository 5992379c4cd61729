//! Minimum-contrast adjustment using WCAG relative luminance.

pub type Rgb = (u8, u8, u8);

/// RGB for a cell colour, when it is fixed. Palette entries 0..=15 come
/// from the page theme and have no fixed value.
pub fn resolve(color: u32) -> Option<Rgb> {
    match color {
        0..=15 => None,
        16..=231 => {
            let index = color - 16;
            let level = |v: u32| if v == 0 { 0 } else { (55 + v * 40) as u8 };
            Some((level(index / 36), level((index / 6) % 6), level(index % 6)))
        }
        232..=255 => {
            let grey = (8 + (color - 232) * 10) as u8;
            Some((grey, grey, grey))
        }
        _ => Some((
            ((color >> 16) & 0xff) as u8,
            ((color >> 8) & 0xff) as u8,
            (color & 0xff) as u8,
        )),
    }
}

fn linear(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn luminance((r, g, b): Rgb) -> f64 {
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let (la, lb) = (luminance(a), luminance(b));
    let (hi, lo) = if la >= lb { (la, lb) } else { (lb, la) };
    (hi + 0.05) / (lo + 0.05)
}

fn mix(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    (lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
}

/// Foreground to draw over `bg` so the pair reaches `min_ratio`, moving
/// `fg` towards black or white, whichever contrasts more with `bg`.
/// `None` means `fg` is fine as it is.
pub fn adjust_foreground(fg: Rgb, bg: Rgb, min_ratio: f64) -> Option<Rgb> {
    if min_ratio <= 1.0 || contrast_ratio(fg, bg) >= min_ratio {
        return None;
    }

    const BLACK: Rgb = (0, 0, 0);
    const WHITE: Rgb = (255, 255, 255);
    let target = if contrast_ratio(WHITE, bg) >= contrast_ratio(BLACK, bg) {
        WHITE
    } else {
        BLACK
    };

    (1..=10)
        .map(|step| mix(fg, target, f64::from(step) / 10.0))
        .find(|candidate| contrast_ratio(*candidate, bg) >= min_ratio)
        .or(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_cube_grey_and_packed_colours() {
        assert_eq!(resolve(1), None);
        assert_eq!(resolve(16), Some((0, 0, 0)));
        assert_eq!(resolve(196), Some((255, 0, 0)));
        assert_eq!(resolve(232), Some((8, 8, 8)));
        assert_eq!(resolve(0x112233), Some((0x11, 0x22, 0x33)));
    }

    #[test]
    fn ratio_is_symmetric_and_bounded() {
        let black = (0, 0, 0);
        let white = (255, 255, 255);
        assert!((contrast_ratio(black, white) - 21.0).abs() < 0.01);
        assert_eq!(contrast_ratio(white, black), contrast_ratio(black, white));
        assert!((contrast_ratio(white, white) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dim_foreground_is_lifted_to_the_minimum() {
        let fg = (0x22, 0x22, 0x22);
        let bg = (0x11, 0x11, 0x11);
        assert!(contrast_ratio(fg, bg) < 1.5);

        let adjusted = adjust_foreground(fg, bg, 1.5).unwrap();
        assert!(contrast_ratio(adjusted, bg) >= 1.5);
        assert!(adjusted.0 > fg.0);

        assert_eq!(adjust_foreground(fg, bg, 1.0), None);
        assert_eq!(adjust_foreground((255, 255, 255), bg, 1.5), None);
    }
}

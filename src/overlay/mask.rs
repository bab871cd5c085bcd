use image::{Rgba, RgbaImage};

use super::Rect;

/// Paints `rect` (outline and fill) in `color`, clipped to the image.
pub(super) fn fill_rect(image: &mut RgbaImage, rect: &Rect, color: Rgba<u8>) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    let x0 = (rect.left as i64).max(0);
    let y0 = (rect.top as i64).max(0);
    let x1 = (rect.right as i64).min(max_x);
    let y1 = (rect.bottom as i64).min(max_y);
    if x0 > x1 || y0 > y1 {
        return;
    }
    for y in y0..=y1 {
        for x in x0..=x1 {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn fill_covers_both_corners() {
        let mut image = RgbaImage::from_pixel(10, 10, INK);
        fill_rect(&mut image, &Rect::new(2, 3, 5, 6), PAPER);
        assert_eq!(*image.get_pixel(2, 3), PAPER);
        assert_eq!(*image.get_pixel(5, 6), PAPER);
        assert_eq!(*image.get_pixel(6, 6), INK);
        assert_eq!(*image.get_pixel(1, 3), INK);
        let painted = image.pixels().filter(|pixel| **pixel == PAPER).count();
        assert_eq!(painted, 4 * 4);
    }

    #[test]
    fn fill_is_clipped_to_the_canvas() {
        let mut image = RgbaImage::from_pixel(4, 4, INK);
        fill_rect(&mut image, &Rect::new(-3, -3, 1, 1), PAPER);
        assert_eq!(*image.get_pixel(0, 0), PAPER);
        assert_eq!(*image.get_pixel(1, 1), PAPER);
        assert_eq!(*image.get_pixel(2, 2), INK);

        fill_rect(&mut image, &Rect::new(10, 10, 20, 20), PAPER);
        assert_eq!(*image.get_pixel(3, 3), INK);
    }
}

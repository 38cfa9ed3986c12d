//! Отрисовка спектрограмм и матриц выравнивания в RGB изображения
//!
//! Ячейка матрицы - один пиксель, нулевая строка внизу изображения.
//! Значения нормируются по минимуму и максимуму матрицы и окрашиваются
//! палитрой, близкой к viridis.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use once_cell::sync::OnceCell;

use crate::error::{Result, TtsPrepError};

const COLORMAP_SIZE: usize = 256;

// Опорные точки viridis
const VIRIDIS_ANCHORS: [[f32; 3]; 9] = [
    [68.0, 1.0, 84.0],
    [72.0, 40.0, 120.0],
    [62.0, 74.0, 137.0],
    [49.0, 104.0, 142.0],
    [38.0, 130.0, 142.0],
    [31.0, 158.0, 137.0],
    [53.0, 183.0, 121.0],
    [109.0, 205.0, 89.0],
    [253.0, 231.0, 37.0],
];

static COLORMAP: OnceCell<Vec<Rgb<u8>>> = OnceCell::new();

fn build_colormap() -> Vec<Rgb<u8>> {
    let segments = (VIRIDIS_ANCHORS.len() - 1) as f32;
    (0..COLORMAP_SIZE)
        .map(|i| {
            let pos = i as f32 / (COLORMAP_SIZE - 1) as f32 * segments;
            let lo = (pos.floor() as usize).min(VIRIDIS_ANCHORS.len() - 2);
            let t = pos - lo as f32;
            let (a, b) = (VIRIDIS_ANCHORS[lo], VIRIDIS_ANCHORS[lo + 1]);
            Rgb([
                (a[0] + (b[0] - a[0]) * t).round() as u8,
                (a[1] + (b[1] - a[1]) * t).round() as u8,
                (a[2] + (b[2] - a[2]) * t).round() as u8,
            ])
        })
        .collect()
}

/// Подготовить палитру; повторные вызовы ничего не делают
pub fn init_plotting() -> &'static [Rgb<u8>] {
    COLORMAP.get_or_init(|| {
        log::debug!("Initializing plotting colormap");
        build_colormap()
    })
}

/// Цвет нормированного значения из [0, 1]
pub fn colormap(value: f32) -> Rgb<u8> {
    let map = init_plotting();
    let value = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    map[(value * (COLORMAP_SIZE - 1) as f32).round() as usize]
}

fn check_matrix(matrix: &[Vec<f32>], what: &str) -> Result<(usize, usize)> {
    let rows = matrix.len();
    let cols = matrix.first().map(Vec::len).unwrap_or(0);
    if rows == 0 || cols == 0 {
        return Err(TtsPrepError::InvalidFormat(format!("{} is empty", what)));
    }
    if let Some((idx, row)) = matrix.iter().enumerate().find(|(_, row)| row.len() != cols) {
        return Err(TtsPrepError::InvalidFormat(format!(
            "{} row {} has {} values, expected {}",
            what,
            idx,
            row.len(),
            cols
        )));
    }
    Ok((rows, cols))
}

fn value_range(matrix: &[Vec<f32>]) -> (f32, f32) {
    matrix
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Нарисовать матрицу: `value_at(x, y)`, `y = 0` - нижняя строка
fn render(width: usize, height: usize, range: (f32, f32), value_at: impl Fn(usize, usize) -> f32) -> RgbImage {
    let (lo, hi) = range;
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut image = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let normalized = if hi > lo { (value_at(x, y) - lo) / span } else { 0.0 };
            let pixel_y = (height - 1 - y) as u32;
            image.put_pixel(x as u32, pixel_y, colormap(normalized));
        }
    }
    image
}

/// Спектрограмма `[channels][frames]`: каналы по вертикали, кадры по горизонтали
pub fn plot_spectrogram_to_image(spectrogram: &[Vec<f32>]) -> Result<RgbImage> {
    let (channels, frames) = check_matrix(spectrogram, "spectrogram")?;
    Ok(render(frames, channels, value_range(spectrogram), |x, y| spectrogram[y][x]))
}

/// Выравнивание `[decoder_steps][encoder_steps]`: шаги декодера по
/// горизонтали, шаги энкодера по вертикали
pub fn plot_alignment_to_image(alignment: &[Vec<f32>]) -> Result<RgbImage> {
    let (decoder_steps, encoder_steps) = check_matrix(alignment, "alignment")?;
    Ok(render(decoder_steps, encoder_steps, value_range(alignment), |x, y| alignment[x][y]))
}

/// Сохранить изображение в PNG
pub fn save_png<P: AsRef<Path>>(image: &RgbImage, path: P) -> Result<()> {
    let path = path.as_ref();
    image.save_with_format(path, ImageFormat::Png)?;
    log::debug!("Saved plot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_plotting_is_idempotent() {
        let first = init_plotting();
        let second = init_plotting();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.len(), COLORMAP_SIZE);
        assert_eq!(first[0], Rgb([68, 1, 84]));
        assert_eq!(first[COLORMAP_SIZE - 1], Rgb([253, 231, 37]));
    }

    #[test]
    fn test_spectrogram_origin_is_lower() {
        // 2 канала x 3 кадра, максимум в канале 0 кадра 2
        let spec = vec![vec![0.0, 0.0, 1.0], vec![0.0, 0.0, 0.0]];
        let image = plot_spectrogram_to_image(&spec).unwrap();

        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(*image.get_pixel(2, 1), colormap(1.0));
        assert_eq!(*image.get_pixel(2, 0), colormap(0.0));
    }

    #[test]
    fn test_alignment_is_transposed() {
        // 3 шага декодера x 2 шага энкодера
        let alignment = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 1.0]];
        let image = plot_alignment_to_image(&alignment).unwrap();

        assert_eq!(image.dimensions(), (3, 2));
        // декодер 0 смотрит на энкодер 0 (нижняя строка)
        assert_eq!(*image.get_pixel(0, 1), colormap(1.0));
        assert_eq!(*image.get_pixel(1, 0), colormap(1.0));
    }

    #[test]
    fn test_constant_matrix() {
        let image = plot_spectrogram_to_image(&[vec![3.0, 3.0]]).unwrap();
        assert!(image.pixels().all(|p| *p == colormap(0.0)));
    }

    #[test]
    fn test_invalid_matrices() {
        assert!(matches!(plot_spectrogram_to_image(&[]), Err(TtsPrepError::InvalidFormat(_))));
        assert!(matches!(
            plot_alignment_to_image(&[vec![1.0, 2.0], vec![1.0]]),
            Err(TtsPrepError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.png");
        let image = plot_spectrogram_to_image(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();

        save_png(&image, &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}

use image::Primitive;

/// Summed-area table (integral image) over a single channel
///
/// Stores, for every coordinate `(x, y)`, the sum of all values in the
/// rectangle spanning `(0, 0)` to `(x, y)` inclusive, so that any
/// axis-aligned window sum costs four lookups regardless of its size.
pub struct SummedAreaTable<T> {
    data: Vec<T>,
    width: u32,
    height: u32,
}

impl<T> SummedAreaTable<T>
where
    T: Primitive,
{
    /// Builds a table from row-major single-channel data.
    ///
    /// # Panics
    ///
    /// Panics if `data.len() != width * height`.
    pub fn from_data(data: &[T], width: u32, height: u32) -> Self {
        assert_eq!(data.len(), width as usize * height as usize);

        let row = width as usize;
        let mut sat_data = vec![T::zero(); data.len()];

        for y in 0..height as usize {
            let mut row_sum = T::zero();
            for x in 0..row {
                let index = y * row + x;
                row_sum = row_sum + data[index];

                // sat(x, y) = row_sum(0..=x, y) + sat(x, y - 1)
                sat_data[index] = if y > 0 {
                    row_sum + sat_data[index - row]
                } else {
                    row_sum
                };
            }
        }

        Self {
            data: sat_data,
            width,
            height,
        }
    }

    /// Builds a table from `f(index)` evaluated for every pixel index.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(usize) -> T) -> Self {
        let values: Vec<T> = (0..width as usize * height as usize).map(f).collect();
        Self::from_data(&values, width, height)
    }

    /// Table value at `(x, y)`, or zero outside the image.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> T {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            T::zero()
        } else {
            self.data[y as usize * self.width as usize + x as usize]
        }
    }

    /// Sum of values in the inclusive rectangle `(x1, y1)..=(x2, y2)`.
    ///
    /// The rectangle is clipped to the image; an empty intersection sums to
    /// zero.
    ///
    /// Sum = sat(x2, y2) - sat(x1-1, y2) - sat(x2, y1-1) + sat(x1-1, y1-1)
    #[must_use]
    pub fn rectangle_sum(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> T {
        let x1 = x1.max(0);
        let y1 = y1.max(0);
        let x2 = x2.min(i64::from(self.width) - 1);
        let y2 = y2.min(i64::from(self.height) - 1);

        if x1 > x2 || y1 > y2 {
            return T::zero();
        }

        let bottom_right = self.get(x2, y2);
        let top_right = self.get(x2, y1 - 1);
        let bottom_left = self.get(x1 - 1, y2);
        let top_left = self.get(x1 - 1, y1 - 1);

        bottom_right - top_right - bottom_left + top_left
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_summed_area_table() {
        let data = vec![1u32, 2, 3, 4, 5, 6, 7, 8, 9];
        let sat = SummedAreaTable::from_data(&data, 3, 3);

        // 1  3  6
        // 5  12 21
        // 12 27 45
        assert_eq!(sat.get(0, 0), 1);
        assert_eq!(sat.get(1, 0), 3);
        assert_eq!(sat.get(2, 0), 6);
        assert_eq!(sat.get(0, 1), 5);
        assert_eq!(sat.get(1, 1), 12);
        assert_eq!(sat.get(2, 1), 21);
        assert_eq!(sat.get(0, 2), 12);
        assert_eq!(sat.get(1, 2), 27);
        assert_eq!(sat.get(2, 2), 45);
    }

    #[test]
    fn test_rectangle_sum() {
        let data = vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let sat = SummedAreaTable::from_data(&data, 3, 3);

        assert_eq!(sat.rectangle_sum(0, 0, 2, 2), 45.0);
        assert_eq!(sat.rectangle_sum(1, 1, 1, 1), 5.0);
        assert_eq!(sat.rectangle_sum(0, 0, 1, 1), 12.0);
        assert_eq!(sat.rectangle_sum(1, 1, 2, 2), 28.0);
    }

    #[test]
    fn test_boundary_conditions() {
        let sat = SummedAreaTable::from_fn(2, 2, |index| index as u32 + 1);

        assert_eq!(sat.get(-1, 0), 0);
        assert_eq!(sat.get(0, -1), 0);
        assert_eq!(sat.get(2, 0), 0);
        assert_eq!(sat.get(0, 2), 0);

        // Windows hanging off the image are clipped
        assert_eq!(sat.rectangle_sum(1, 1, 0, 0), 0);
        assert_eq!(sat.rectangle_sum(-1, -1, 0, 0), 1);
        assert_eq!(sat.rectangle_sum(-5, -5, 5, 5), 10);
    }
}

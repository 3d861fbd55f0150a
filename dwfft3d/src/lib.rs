use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use types::c64;

/// Complex 3D FFT on a column-major (n1 fastest) grid.
///
/// The forward transform uses exp(-i G.r), the backward transform exp(+i G.r).
/// Neither direction is normalized.
pub struct DWFFT3D {
    shape: [usize; 3],
    plan_fwd: [Arc<dyn Fft<f64>>; 3],
    plan_bwd: [Arc<dyn Fft<f64>>; 3],
}

impl DWFFT3D {
    pub fn new(n1: usize, n2: usize, n3: usize) -> DWFFT3D {
        let mut planner = FftPlanner::<f64>::new();

        let plan_fwd = [
            planner.plan_fft_forward(n1),
            planner.plan_fft_forward(n2),
            planner.plan_fft_forward(n3),
        ];

        let plan_bwd = [
            planner.plan_fft_inverse(n1),
            planner.plan_fft_inverse(n2),
            planner.plan_fft_inverse(n3),
        ];

        DWFFT3D {
            shape: [n1, n2, n3],
            plan_fwd,
            plan_bwd,
        }
    }

    pub fn get_size(&self) -> [usize; 3] {
        self.shape
    }

    pub fn fft3d(&self, slice_in: &[c64], slice_out: &mut [c64]) {
        slice_out.copy_from_slice(slice_in);
        self.execute(&self.plan_fwd, slice_out);
    }

    pub fn ifft3d(&self, slice_in: &[c64], slice_out: &mut [c64]) {
        slice_out.copy_from_slice(slice_in);
        self.execute(&self.plan_bwd, slice_out);
    }

    fn execute(&self, plans: &[Arc<dyn Fft<f64>>; 3], data: &mut [c64]) {
        let [n1, n2, n3] = self.shape;

        assert_eq!(data.len(), n1 * n2 * n3);

        let scratch_len = plans
            .iter()
            .map(|p| p.get_inplace_scratch_len())
            .max()
            .unwrap_or(0);

        let mut scratch = vec![c64::new(0.0, 0.0); scratch_len];

        // first axis is contiguous, every chunk of n1 is one line

        plans[0].process_with_scratch(data, &mut scratch);

        // second axis, stride n1

        let mut line = vec![c64::new(0.0, 0.0); n2];

        for k in 0..n3 {
            for i in 0..n1 {
                let offset = i + k * n1 * n2;

                for j in 0..n2 {
                    line[j] = data[offset + j * n1];
                }

                plans[1].process_with_scratch(&mut line, &mut scratch);

                for j in 0..n2 {
                    data[offset + j * n1] = line[j];
                }
            }
        }

        // third axis, stride n1*n2

        let n12 = n1 * n2;
        let mut line = vec![c64::new(0.0, 0.0); n3];

        for offset in 0..n12 {
            for k in 0..n3 {
                line[k] = data[offset + k * n12];
            }

            plans[2].process_with_scratch(&mut line, &mut scratch);

            for k in 0..n3 {
                data[offset + k * n12] = line[k];
            }
        }
    }
}

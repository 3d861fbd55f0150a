use crate::Smearing;

pub struct SmearingFD {}

impl Smearing for SmearingFD {
    fn occupation(&self, x: f64) -> f64 {
        1.0 / (x.exp() + 1.0)
    }

    // -f ln f - (1 - f) ln(1 - f)
    fn entropy(&self, x: f64) -> f64 {
        let f = self.occupation(x);

        let mut s = 0.0;

        if f > 0.0 {
            s -= f * f.ln();
        }

        if f < 1.0 {
            s -= (1.0 - f) * (1.0 - f).ln();
        }

        s
    }
}

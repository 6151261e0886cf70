//! Angle of incidence on a tilted plane (Duffie & Beckman, eq. 1.6.2).
//!
//! All angles in radians. Azimuth is zero facing south,
//! positive towards west; hour angle is positive in the afternoon.

/// Plane orientation at a site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidenceAngles {
    pub latitude: f64,
    pub tilt: f64,
    pub azimuth: f64,
}

/// Partial derivatives of cos(θ) with respect to latitude, tilt and azimuth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidenceGradient {
    pub latitude: f64,
    pub tilt: f64,
    pub azimuth: f64,
}

struct Trig {
    sd: f64,
    cd: f64,
    sp: f64,
    cp: f64,
    sb: f64,
    cb: f64,
    sg: f64,
    cg: f64,
    sw: f64,
    cw: f64,
}

impl Trig {
    fn new(angles: &IncidenceAngles, hour_angle: f64, declination: f64) -> Self {
        let (sd, cd) = declination.sin_cos();
        let (sp, cp) = angles.latitude.sin_cos();
        let (sb, cb) = angles.tilt.sin_cos();
        let (sg, cg) = angles.azimuth.sin_cos();
        let (sw, cw) = hour_angle.sin_cos();
        Self {
            sd,
            cd,
            sp,
            cp,
            sb,
            cb,
            sg,
            cg,
            sw,
            cw,
        }
    }

    fn cos_theta(&self) -> f64 {
        let t = self;
        t.sd * t.sp * t.cb - t.sd * t.cp * t.sb * t.cg
            + t.cd * t.cp * t.cb * t.cw
            + t.cd * t.sp * t.sb * t.cg * t.cw
            + t.cd * t.sb * t.sg * t.sw
    }

    fn gradient(&self) -> IncidenceGradient {
        let t = self;
        IncidenceGradient {
            latitude: t.sd * t.cp * t.cb + t.sd * t.sp * t.sb * t.cg - t.cd * t.sp * t.cb * t.cw
                + t.cd * t.cp * t.sb * t.cg * t.cw,
            tilt: -t.sd * t.sp * t.sb - t.sd * t.cp * t.cb * t.cg - t.cd * t.cp * t.sb * t.cw
                + t.cd * t.sp * t.cb * t.cg * t.cw
                + t.cd * t.cb * t.sg * t.sw,
            azimuth: t.sd * t.cp * t.sb * t.sg - t.cd * t.sp * t.sb * t.sg * t.cw
                + t.cd * t.sb * t.cg * t.sw,
        }
    }
}

impl IncidenceAngles {
    pub fn new(latitude: f64, tilt: f64, azimuth: f64) -> Self {
        Self {
            latitude,
            tilt,
            azimuth,
        }
    }

    pub fn cos_theta(&self, hour_angle: f64, declination: f64) -> f64 {
        Trig::new(self, hour_angle, declination).cos_theta()
    }

    pub fn cos_theta_with_gradient(
        &self,
        hour_angle: f64,
        declination: f64,
    ) -> (f64, IncidenceGradient) {
        let trig = Trig::new(self, hour_angle, declination);
        (trig.cos_theta(), trig.gradient())
    }
}

/// Cosine of the solar zenith angle, i.e. incidence on a horizontal plane.
pub fn cos_zenith(latitude: f64, hour_angle: f64, declination: f64) -> f64 {
    IncidenceAngles::new(latitude, 0.0, 0.0).cos_theta(hour_angle, declination)
}

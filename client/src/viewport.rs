use outbreak_shared::LatLng;
use outbreak_shared::selection::Viewport;

/// Pixels per degree at zoom 0; one 256px tile spans 360 degrees.
const BASE_PX_PER_DEGREE: f64 = 256.0 / 360.0;
/// Metres per degree of latitude (and of longitude at the equator).
const METRES_PER_DEGREE: f64 = 111_320.0;
const MIN_ZOOM: f64 = 1.0;
const MAX_ZOOM: f64 = 10.0;
const ZOOM_SENSITIVITY: f64 = 0.002;

/// Equirectangular camera over the bubble map.
///
/// Seeded from the selection viewport; wheel and drag move it locally without
/// touching the selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapCamera {
    pub center: LatLng,
    pub zoom: f64,
}

impl Default for MapCamera {
    fn default() -> Self {
        Self::from(Viewport::default())
    }
}

impl From<Viewport> for MapCamera {
    fn from(viewport: Viewport) -> Self {
        Self {
            center: viewport.center,
            zoom: viewport.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
        }
    }
}

impl MapCamera {
    pub fn px_per_degree(&self) -> f64 {
        BASE_PX_PER_DEGREE * self.zoom.exp2()
    }

    /// Project a coordinate onto a `w` x `h` canvas.
    pub fn to_screen(&self, pos: LatLng, w: f64, h: f64) -> (f64, f64) {
        let ppd = self.px_per_degree();
        (
            w / 2.0 + (pos.lng - self.center.lng) * ppd,
            h / 2.0 - (pos.lat - self.center.lat) * ppd,
        )
    }

    pub fn to_world(&self, sx: f64, sy: f64, w: f64, h: f64) -> LatLng {
        let ppd = self.px_per_degree();
        LatLng::new(
            self.center.lat - (sy - h / 2.0) / ppd,
            self.center.lng + (sx - w / 2.0) / ppd,
        )
    }

    /// Ground distance in metres as screen pixels.
    pub fn metres_to_px(&self, metres: f64) -> f64 {
        metres / METRES_PER_DEGREE * self.px_per_degree()
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, sx: f64, sy: f64, w: f64, h: f64) {
        let focus = self.to_world(sx, sy, w, h);
        self.zoom = (self.zoom - delta * ZOOM_SENSITIVITY).clamp(MIN_ZOOM, MAX_ZOOM);
        // Keep the point under the cursor fixed
        let ppd = self.px_per_degree();
        self.center = LatLng::new(
            focus.lat + (sy - h / 2.0) / ppd,
            focus.lng - (sx - w / 2.0) / ppd,
        );
    }

    /// Pan by screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        let ppd = self.px_per_degree();
        self.center = LatLng::new(
            (self.center.lat + dy / ppd).clamp(-85.0, 85.0),
            self.center.lng - dx / ppd,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::MapCamera;
    use outbreak_shared::LatLng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn center_projects_to_canvas_middle() {
        let cam = MapCamera {
            center: LatLng::new(38.0, -97.0),
            zoom: 4.0,
        };
        let (x, y) = cam.to_screen(LatLng::new(38.0, -97.0), 800.0, 600.0);
        assert!(close(x, 400.0) && close(y, 300.0));
    }

    #[test]
    fn north_is_up_and_east_is_right() {
        let cam = MapCamera::default();
        let (cx, cy) = cam.to_screen(cam.center, 800.0, 600.0);
        let (ex, _) = cam.to_screen(LatLng::new(cam.center.lat, cam.center.lng + 10.0), 800.0, 600.0);
        let (_, ny) = cam.to_screen(LatLng::new(cam.center.lat + 10.0, cam.center.lng), 800.0, 600.0);
        assert!(ex > cx);
        assert!(ny < cy);
    }

    #[test]
    fn screen_and_world_are_inverse() {
        let cam = MapCamera {
            center: LatLng::new(42.8, 12.8),
            zoom: 3.5,
        };
        let pos = LatLng::new(48.85, 2.35);
        let (x, y) = cam.to_screen(pos, 1024.0, 768.0);
        let back = cam.to_world(x, y, 1024.0, 768.0);
        assert!(close(back.lat, pos.lat) && close(back.lng, pos.lng));
    }

    #[test]
    fn zoom_keeps_focus_point_fixed() {
        let mut cam = MapCamera::default();
        let focus = cam.to_world(200.0, 150.0, 800.0, 600.0);
        cam.zoom_at(-250.0, 200.0, 150.0, 800.0, 600.0);
        let (x, y) = cam.to_screen(focus, 800.0, 600.0);
        assert!(close(x, 200.0) && close(y, 150.0));
    }

    #[test]
    fn zoom_doubles_pixel_scale_per_level() {
        let a = MapCamera {
            center: LatLng::new(0.0, 0.0),
            zoom: 3.0,
        };
        let b = MapCamera { zoom: 4.0, ..a };
        assert!(close(b.metres_to_px(50_000.0), 2.0 * a.metres_to_px(50_000.0)));
    }
}

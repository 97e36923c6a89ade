use num_traits::Float;

/// Returns how far (meters) the surface at `distance_m` has dropped
/// below the observer's horizontal plane, after terrestrial
/// refraction lifts it back by `refraction_coefficient`.
pub fn curvature_drop<T>(distance_m: T, earth_radius_m: T, refraction_coefficient: T) -> T
where
    T: Float,
{
    let two = T::one() + T::one();
    distance_m.powi(2) * (T::one() - refraction_coefficient) / (two * earth_radius_m)
}

/// Returns the up/down angle (in radians) to a point `rise_m` above
/// the observer's eye and `distance_m` away along the ground.
pub fn apparent_elevation_angle<T>(
    rise_m: T,
    distance_m: T,
    earth_radius_m: T,
    refraction_coefficient: T,
) -> T
where
    T: Float,
{
    let drop = curvature_drop(distance_m, earth_radius_m, refraction_coefficient);
    ((rise_m - drop) / distance_m).atan()
}

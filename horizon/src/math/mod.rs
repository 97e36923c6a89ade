mod destination;
mod elevation_angle;

pub(crate) use destination::DestinationIter;
pub use elevation_angle::curvature_drop;
pub(crate) use elevation_angle::apparent_elevation_angle;

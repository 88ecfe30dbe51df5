pub mod bloom;
pub mod film_grain;
pub mod tonemapping;

pub use bloom::Bloom;
pub use film_grain::FilmGrain;
pub use tonemapping::Tonemapping;

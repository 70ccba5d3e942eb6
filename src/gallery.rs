//! Read-only queries over galleries and their photos.
//!
//! Everything here is derived from [`Catalog`] listings, so results follow
//! the catalog's newest-first order. `public` flags filter on
//! [`Photo::is_public`]; neighbour lookups only ever return public photos.

use crate::catalog::{Catalog, CatalogError};
use crate::types::{Gallery, Photo};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

fn load_gallery<C: Catalog>(catalog: &C, slug: &str) -> Result<Gallery, CatalogError> {
    catalog
        .gallery(slug)?
        .ok_or_else(|| CatalogError::GalleryNotFound(slug.to_string()))
}

/// Member photos of a gallery, newest first.
pub fn gallery_photos<C: Catalog>(catalog: &C, gallery: &str) -> Result<Vec<Photo>, CatalogError> {
    let gallery = load_gallery(catalog, gallery)?;
    let members: HashSet<&str> = gallery.photos.iter().map(String::as_str).collect();
    Ok(catalog
        .photos()?
        .into_iter()
        .filter(|p| members.contains(p.slug.as_str()))
        .collect())
}

fn filtered<C: Catalog>(catalog: &C, gallery: &str, public: bool) -> Result<Vec<Photo>, CatalogError> {
    let mut photos = gallery_photos(catalog, gallery)?;
    if public {
        photos.retain(|p| p.is_public);
    }
    Ok(photos)
}

pub fn public_photos<C: Catalog>(catalog: &C, gallery: &str) -> Result<Vec<Photo>, CatalogError> {
    filtered(catalog, gallery, true)
}

/// The `limit` most recently added photos.
pub fn latest<C: Catalog>(
    catalog: &C,
    gallery: &str,
    limit: usize,
    public: bool,
) -> Result<Vec<Photo>, CatalogError> {
    let mut photos = filtered(catalog, gallery, public)?;
    photos.truncate(limit);
    Ok(photos)
}

/// Up to `count` distinct photos picked at random.
pub fn sample<C: Catalog, R: Rng + ?Sized>(
    catalog: &C,
    gallery: &str,
    count: usize,
    public: bool,
    rng: &mut R,
) -> Result<Vec<Photo>, CatalogError> {
    let photos = filtered(catalog, gallery, public)?;
    Ok(photos.choose_multiple(rng, count).cloned().collect())
}

pub fn photo_count<C: Catalog>(catalog: &C, gallery: &str, public: bool) -> Result<usize, CatalogError> {
    Ok(filtered(catalog, gallery, public)?.len())
}

/// Public galleries that contain `photo`.
pub fn public_galleries<C: Catalog>(catalog: &C, photo: &str) -> Result<Vec<Gallery>, CatalogError> {
    Ok(catalog
        .galleries()?
        .into_iter()
        .filter(|g| g.is_public && g.photos.iter().any(|p| p == photo))
        .collect())
}

/// The public photo added just before `photo` in `gallery`.
pub fn previous_in_gallery<C: Catalog>(
    catalog: &C,
    photo: &Photo,
    gallery: &str,
) -> Result<Option<Photo>, CatalogError> {
    // Newest first, so the first older one is the nearest
    Ok(public_photos(catalog, gallery)?
        .into_iter()
        .find(|p| p.date_added < photo.date_added))
}

/// The public photo added just after `photo` in `gallery`.
pub fn next_in_gallery<C: Catalog>(
    catalog: &C,
    photo: &Photo,
    gallery: &str,
) -> Result<Option<Photo>, CatalogError> {
    Ok(public_photos(catalog, gallery)?
        .into_iter()
        .rev()
        .find(|p| p.date_added > photo.date_added))
}

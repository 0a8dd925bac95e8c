//! Loaders for the whitespace-separated benchmark file formats.
//!
//! A dataset file carries the dimension as its first token, then the point
//! coordinates in row-major order, `dim` values per point. A ground-truth
//! file is a bare sequence of integer labels, one per point.

use crate::{Dataset, Error, Point, Primitive, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub fn read_dataset<T: Primitive>(mut reader: impl BufRead) -> Result<Dataset<T>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut tokens = text.split_whitespace();
    let head = tokens.next().ok_or(Error::MissingDimension)?;
    let dim: i64 = head.parse().map_err(|_| Error::BadToken { token: head.to_string() })?;
    if dim <= 0 {
        return Err(Error::InvalidDimension { dim });
    }
    let dim = dim as usize;

    let mut points = Vec::new();
    let mut coords: Vec<T> = Vec::with_capacity(dim);
    for token in tokens {
        let value: f64 = token.parse()
            .map_err(|_| Error::BadToken { token: token.to_string() })?;
        coords.push(T::from(value).ok_or_else(|| Error::BadToken { token: token.to_string() })?);
        if coords.len() == dim {
            points.push(Point::new(std::mem::replace(&mut coords, Vec::with_capacity(dim))));
        }
    }
    if !coords.is_empty() {
        return Err(Error::RaggedPoint { dim, got: coords.len() });
    }
    if points.is_empty() {
        return Err(Error::EmptyDataset);
    }
    Ok(Dataset { dim, points })
}

pub fn read_dataset_file<T: Primitive>(path: impl AsRef<Path>) -> Result<Dataset<T>> {
    read_dataset(BufReader::new(File::open(path)?))
}

pub fn read_true_labels(mut reader: impl BufRead) -> Result<Vec<i64>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    text.split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| Error::BadToken { token: token.to_string() })
        })
        .collect()
}

pub fn read_true_labels_file(path: impl AsRef<Path>) -> Result<Vec<i64>> {
    read_true_labels(BufReader::new(File::open(path)?))
}

//! Writing beam cubes as FITS primary images.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, trace};

use super::{error::IOError, CubeKey, CubeSink};
use crate::{
    cube::{BeamCube, CubeWcs},
    marlu::fitsio::{
        images::{ImageDescription, ImageType},
        FitsFile,
    },
    ndarray::Array3,
};

/// Writes each product of a beam cube to its own FITS file, laid out as
/// `<out_dir>/<date>/ant_<a>/<calibrator>_<date>_<beam>_ant<a>_<product>.fits`.
///
/// Single dish cubes (no antenna) go straight into `<out_dir>/<date>/`,
/// without the antenna suffix.
#[derive(Clone, Debug)]
pub struct FitsCubeWriter {
    pub out_dir: PathBuf,
    pub date_label: String,
    /// Calibrator name without spaces
    pub calibrator_label: String,
    /// Also write the decibel cubes
    pub write_db: bool,
}

impl FitsCubeWriter {
    pub fn cube_dir(&self, antenna: Option<usize>) -> PathBuf {
        let dir = self.out_dir.join(&self.date_label);
        match antenna {
            Some(antenna) => dir.join(format!("ant_{}", antenna)),
            None => dir,
        }
    }

    pub fn cube_path(&self, key: CubeKey, product: &str) -> PathBuf {
        let antenna_suffix = key
            .antenna
            .map(|antenna| format!("_ant{}", antenna))
            .unwrap_or_default();
        self.cube_dir(key.antenna).join(format!(
            "{}_{}_{:02}{}_{}.fits",
            self.calibrator_label, self.date_label, key.beam, antenna_suffix, product
        ))
    }
}

impl CubeSink for FitsCubeWriter {
    fn write_cube(&self, key: CubeKey, cube: &BeamCube) -> Result<(), IOError> {
        let dir = self.cube_dir(key.antenna);
        fs::create_dir_all(&dir).map_err(|io_error| IOError::Io {
            io_error,
            path: dir.clone(),
        })?;
        for (product, data) in cube.products(self.write_db) {
            let path = self.cube_path(key, product);
            let object = format!("{} {}", self.calibrator_label, product);
            write_fits_cube(&path, data, &cube.wcs, &object, key)?;
        }
        debug!(
            "wrote beam {:02} cubes to {}",
            key.beam,
            dir.display()
        );
        Ok(())
    }
}

/// Write `data` (bins, rows, columns) as the primary image of a new FITS
/// file at `path`, replacing any existing file.
///
/// # Errors
///
/// Fails on any filesystem or cfitsio error.
pub fn write_fits_cube(
    path: &Path,
    data: &Array3<f64>,
    wcs: &CubeWcs,
    object: &str,
    key: CubeKey,
) -> Result<(), IOError> {
    if path.exists() {
        fs::remove_file(path).map_err(|io_error| IOError::Io {
            io_error,
            path: path.to_path_buf(),
        })?;
    }
    let (num_bins, num_rows, num_cols) = data.dim();
    let dim = [num_bins, num_rows, num_cols];
    let image_description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: &dim,
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&image_description)
        .open()
        .map_err(|fits_error| IOError::FitsOpen {
            fits_error,
            fits_filename: path.to_path_buf(),
            source_file: file!(),
            source_line: line!(),
        })?;
    let fits_error = |fits_error| IOError::FitsIO {
        fits_error,
        fits_filename: path.to_path_buf(),
        source_file: file!(),
        source_line: line!(),
    };
    let hdu = fptr.primary_hdu().map_err(fits_error)?;

    let pixels: Vec<f64> = data.iter().copied().collect();
    hdu.write_image(&mut fptr, &pixels).map_err(fits_error)?;

    // World coordinates; axis 1 is the fastest varying (columns)
    for (axis, idx) in [(1, 0), (2, 1), (3, 2)] {
        hdu.write_key(&mut fptr, &format!("CTYPE{}", axis), wcs.ctype[idx])
            .map_err(fits_error)?;
        hdu.write_key(&mut fptr, &format!("CRVAL{}", axis), wcs.crval[idx])
            .map_err(fits_error)?;
        hdu.write_key(&mut fptr, &format!("CDELT{}", axis), wcs.cdelt[idx])
            .map_err(fits_error)?;
        hdu.write_key(&mut fptr, &format!("CRPIX{}", axis), wcs.crpix[idx])
            .map_err(fits_error)?;
        hdu.write_key(&mut fptr, &format!("CUNIT{}", axis), wcs.cunit[idx])
            .map_err(fits_error)?;
    }
    hdu.write_key(&mut fptr, "SPECSYS", wcs.specsys)
        .map_err(fits_error)?;
    hdu.write_key(&mut fptr, "RESTFRQ", wcs.restfrq)
        .map_err(fits_error)?;

    // Provenance
    hdu.write_key(&mut fptr, "OBJECT", object)
        .map_err(fits_error)?;
    hdu.write_key(&mut fptr, "BEAM", key.beam as i64)
        .map_err(fits_error)?;
    if let Some(antenna) = key.antenna {
        hdu.write_key(&mut fptr, "ANTENNA", antenna as i64)
            .map_err(fits_error)?;
    }
    hdu.write_key(&mut fptr, "TELESCOP", "WSRT")
        .map_err(fits_error)?;
    hdu.write_key(&mut fptr, "INSTRUME", "APERTIF")
        .map_err(fits_error)?;
    hdu.write_key(&mut fptr, "ORIGIN", "driftcube")
        .map_err(fits_error)?;
    trace!("wrote {}", path.display());
    Ok(())
}

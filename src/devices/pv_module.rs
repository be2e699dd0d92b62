//! Single-diode PV module electrical model.
//!
//! Computes photocurrent, panel current/power for a DC link voltage, and the
//! maximum-power-point (MPP) voltage via a derivative-based Newton
//! root-find. An optional cubic fit of MPP voltage vs. insolation replaces
//! the root-find at simulation time; the fit is valid only near the fitting
//! temperature.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::errors::{DerError, DerResult};

/// Cell short-circuit current at reference temperature and insolation (A).
pub const ISCR: f64 = 8.03;
/// Short-circuit current temperature coefficient (A/K).
pub const KV: f64 = 0.0017;
/// Cell reference temperature (K).
pub const T0: f64 = 273.15 + 25.0;
/// Cell reverse saturation current (A).
pub const IRS: f64 = 1.2e-7;
/// Electron charge (C).
const Q: f64 = 1.602e-19;
/// Boltzmann constant (J/K).
const K_B: f64 = 1.38e-23;
/// p-n junction ideality factor.
const A: f64 = 1.92;

/// Temperature the MPP polynomial is fitted at (K).
const T_FIT: f64 = 298.15;
/// Insolation bounds of the fitting grid (percent).
const S_MIN: f64 = 10.0;
const S_MAX: f64 = 100.0;
/// Number of fit samples across `[S_MIN, S_MAX]`.
const MPP_FIT_POINTS: usize = 10;

/// Default operating conditions at construction.
pub const DEFAULT_SINSOL: f64 = 100.0;
pub const DEFAULT_TACTUAL: f64 = 298.15;

/// Per-device PV module electrical parameters.
#[derive(Debug, Clone, Copy)]
pub struct ModuleParameters {
    /// Parallel cell count.
    pub np: f64,
    /// Series cell count.
    pub ns: f64,
    /// Nominal MPP voltage, used to seed the root-find (V).
    pub vdcmpp0: f64,
    /// Lower MPP voltage bound (V).
    pub vdcmpp_min: f64,
    /// Upper MPP voltage bound (V).
    pub vdcmpp_max: f64,
}

/// Static module parameter table keyed by device ID.
static MODULE_PARAMETERS: &[(&str, ModuleParameters)] = &[
    (
        "1",
        ModuleParameters {
            np: 2.0,
            ns: 500.0,
            vdcmpp0: 250.0,
            vdcmpp_min: 225.0,
            vdcmpp_max: 300.0,
        },
    ),
    (
        "10",
        ModuleParameters {
            np: 2.0,
            ns: 1000.0,
            vdcmpp0: 750.0,
            vdcmpp_min: 650.0,
            vdcmpp_max: 800.0,
        },
    ),
    (
        "50",
        ModuleParameters {
            np: 11.0,
            ns: 735.0,
            vdcmpp0: 550.0,
            vdcmpp_min: 520.0,
            vdcmpp_max: 650.0,
        },
    ),
    (
        "250",
        ModuleParameters {
            np: 45.0,
            ns: 1000.0,
            vdcmpp0: 750.0,
            vdcmpp_min: 750.0,
            vdcmpp_max: 1000.0,
        },
    ),
];

/// Looks up module parameters for a device ID.
pub fn module_parameters(device_id: &str) -> DerResult<ModuleParameters> {
    MODULE_PARAMETERS
        .iter()
        .find(|(id, _)| *id == device_id)
        .map(|(_, params)| *params)
        .ok_or_else(|| DerError::ParametersNotFound {
            id: device_id.to_string(),
        })
}

/// Newton iteration limits for the MPP root-find.
#[derive(Debug, Clone)]
pub struct MppSolverConfig {
    pub max_iterations: usize,
    /// Absolute tolerance on the dP/dV residual (A).
    pub abs_tol: f64,
}

impl Default for MppSolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            abs_tol: 1e-6,
        }
    }
}

/// Outcome of one MPP root-find.
///
/// `converged` is reported rather than assumed; callers decide whether a
/// non-converged estimate is usable.
#[derive(Debug, Clone, Copy)]
pub struct MppSolve {
    /// MPP voltage estimate (V).
    pub vdc: f64,
    /// Newton iterations taken.
    pub iterations: usize,
    /// Final dP/dV residual (A).
    pub residual: f64,
    pub converged: bool,
}

/// Single-diode PV module with mutable operating conditions.
#[derive(Debug, Clone)]
pub struct PvModule {
    params: ModuleParameters,
    /// Solar insolation in percent. Out-of-range values are accepted
    /// unclamped; range policy is the caller's.
    pub sinsol: f64,
    /// Cell temperature (K).
    pub tactual: f64,
    /// Photocurrent at the current conditions (A).
    pub iph: f64,
    mpp_poly: Option<[f64; 4]>,
    solver: MppSolverConfig,
}

impl PvModule {
    /// Creates a module for `device_id`, optionally precomputing the MPP
    /// polynomial.
    ///
    /// Fails with [`DerError::ParametersNotFound`] for an unknown device ID
    /// and with [`DerError::MppNotConverged`] if a fit sample's root-find
    /// does not converge.
    pub fn new(device_id: &str, sinsol: f64, use_polynomial_mpp: bool) -> DerResult<Self> {
        let params = module_parameters(device_id)?;
        debug!(device_id, sinsol, "creating PV module instance");

        let mut module = Self {
            params,
            sinsol,
            tactual: DEFAULT_TACTUAL,
            iph: 0.0,
            mpp_poly: None,
            solver: MppSolverConfig::default(),
        };
        if use_polynomial_mpp {
            module.fit_mpp_polynomial()?;
        }
        module.iph = module.photocurrent();
        Ok(module)
    }

    pub fn params(&self) -> &ModuleParameters {
        &self.params
    }

    /// Updates insolation and cell temperature and recomputes photocurrent.
    pub fn update_conditions(&mut self, sinsol: f64, tactual: f64) {
        self.sinsol = sinsol;
        self.tactual = tactual;
        self.iph = self.photocurrent();
    }

    /// Single-cell photocurrent at the current conditions (A):
    /// `(Iscr + Kv·(T − T0)) · S/100`.
    pub fn photocurrent(&self) -> f64 {
        (ISCR + KV * (self.tactual - T0)) * (self.sinsol / 100.0)
    }

    /// Thermal-voltage exponent coefficient `q / (k·T·A·Ns)` (1/V).
    fn diode_coefficient(&self) -> f64 {
        Q / (K_B * self.tactual * A * self.params.ns)
    }

    /// Panel current at DC link voltage `vdc` (A):
    /// `Np·Iph − Np·Irs·(exp(q·V/(k·T·A·Ns)) − 1)`.
    pub fn panel_current(&self, vdc: f64) -> f64 {
        let iph = self.photocurrent();
        let a = self.diode_coefficient();
        self.params.np * iph - self.params.np * IRS * ((a * vdc).exp() - 1.0)
    }

    /// Panel output power in per-unit on `sbase`. Reverse-biased operation
    /// is not modeled; negative power floors at zero.
    pub fn panel_power_pu(&self, vdc: f64, sbase: f64) -> f64 {
        (self.panel_current(vdc) * vdc).max(0.0) / sbase
    }

    /// dP/dV residual and its derivative at `vdc`.
    fn mpp_residual(&self, vdc: f64) -> (f64, f64) {
        let np = self.params.np;
        let iph = self.photocurrent();
        let a = self.diode_coefficient();
        let exp_av = (a * vdc).exp();

        let f = np * iph - np * IRS * (exp_av - 1.0) - np * IRS * a * vdc * exp_av;
        let df = -np * IRS * a * exp_av * (2.0 + a * vdc);
        (f, df)
    }

    /// Finds the MPP voltage by Newton iteration on `dP/dV = 0`, seeded at
    /// the device's nominal MPP voltage.
    ///
    /// Iterative and comparatively expensive; simulation-time callers
    /// should prefer [`PvModule::mpp_voltage_from_poly`].
    pub fn mpp_voltage(&self) -> MppSolve {
        let mut vdc = self.params.vdcmpp0;
        let mut residual = f64::INFINITY;

        for iteration in 0..self.solver.max_iterations {
            let (f, df) = self.mpp_residual(vdc);
            residual = f;
            if f.abs() < self.solver.abs_tol {
                return MppSolve {
                    vdc,
                    iterations: iteration,
                    residual,
                    converged: true,
                };
            }
            vdc -= f / df;
        }

        MppSolve {
            vdc,
            iterations: self.solver.max_iterations,
            residual,
            converged: false,
        }
    }

    /// Fits a degree-3 polynomial of MPP voltage vs. insolation over
    /// [`S_MIN`, `S_MAX`] at the fitting temperature, storing 4 coefficients
    /// (highest degree first).
    ///
    /// Temperature is held at `T_FIT` while sampling; the module's operating
    /// conditions are restored afterwards.
    pub fn fit_mpp_polynomial(&mut self) -> DerResult<()> {
        let saved = (self.sinsol, self.tactual);
        self.tactual = T_FIT;

        let result = self.sample_and_fit();

        self.sinsol = saved.0;
        self.tactual = saved.1;
        let coeffs = result?;

        info!(
            c3 = coeffs[0],
            c2 = coeffs[1],
            c1 = coeffs[2],
            c0 = coeffs[3],
            "fitted MPP polynomial"
        );
        self.mpp_poly = Some(coeffs);
        Ok(())
    }

    fn sample_and_fit(&mut self) -> DerResult<[f64; 4]> {
        let step = (S_MAX - S_MIN) / (MPP_FIT_POINTS as f64 - 1.0);
        let mut sinsol_samples = Vec::with_capacity(MPP_FIT_POINTS);
        let mut vdcmpp_samples = Vec::with_capacity(MPP_FIT_POINTS);

        for i in 0..MPP_FIT_POINTS {
            let sinsol = S_MIN + step * i as f64;
            self.sinsol = sinsol;
            let solve = self.mpp_voltage();
            if !solve.converged {
                return Err(DerError::MppNotConverged {
                    iterations: solve.iterations,
                    residual: solve.residual,
                });
            }
            let power_pu = self.panel_power_pu(solve.vdc, crate::grid::BaseValues::SBASE);
            debug!(
                sinsol,
                vdcmpp = solve.vdc,
                power_pu,
                iterations = solve.iterations,
                "MPP fit sample"
            );
            sinsol_samples.push(sinsol);
            vdcmpp_samples.push(solve.vdc);
        }

        fit_cubic(&sinsol_samples, &vdcmpp_samples)
    }

    /// Fitted polynomial coefficients, highest degree first.
    pub fn mpp_polynomial(&self) -> Option<&[f64; 4]> {
        self.mpp_poly.as_ref()
    }

    /// Evaluates the fitted polynomial at `sinsol`. `None` when no fit has
    /// been computed.
    pub fn mpp_voltage_from_poly(&self, sinsol: f64) -> Option<f64> {
        self.mpp_poly
            .map(|z| ((z[0] * sinsol + z[1]) * sinsol + z[2]) * sinsol + z[3])
    }
}

/// Least-squares cubic fit through `(x, y)` samples via SVD on the
/// Vandermonde system. Coefficients highest degree first.
fn fit_cubic(x: &[f64], y: &[f64]) -> DerResult<[f64; 4]> {
    let rows = x.len();
    let vandermonde = DMatrix::from_fn(rows, 4, |r, c| x[r].powi(3 - c as i32));
    let rhs = DVector::from_column_slice(y);

    let svd = vandermonde.svd(true, true);
    let solution = svd
        .solve(&rhs, 1e-12)
        .map_err(|reason| DerError::PolynomialFit {
            reason: reason.to_string(),
        })?;

    Ok([solution[0], solution[1], solution[2], solution[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::BaseValues;

    fn module(device_id: &str, fit: bool) -> PvModule {
        PvModule::new(device_id, 100.0, fit).expect("module should construct")
    }

    #[test]
    fn unknown_device_id_fails_parameter_lookup() {
        let err = PvModule::new("99", 100.0, false).unwrap_err();
        match err {
            DerError::ParametersNotFound { id } => assert_eq!(id, "99"),
            other => panic!("expected ParametersNotFound, got {other}"),
        }
    }

    #[test]
    fn photocurrent_at_reference_is_rated_short_circuit_current() {
        let mut pv = module("10", false);
        pv.update_conditions(100.0, T0);
        assert!((pv.photocurrent() - ISCR).abs() < 1e-12);
    }

    #[test]
    fn photocurrent_scales_linearly_with_insolation() {
        let mut pv = module("10", false);
        pv.update_conditions(100.0, T0);
        let full = pv.photocurrent();
        pv.update_conditions(10.0, T0);
        let tenth = pv.photocurrent();
        assert!((tenth - full / 10.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_insolation_is_not_clamped() {
        let mut pv = module("10", false);
        pv.update_conditions(120.0, T0);
        assert!(pv.photocurrent() > ISCR);
        pv.update_conditions(-5.0, T0);
        assert!(pv.photocurrent() < 0.0);
    }

    #[test]
    fn panel_power_at_zero_voltage_is_zero() {
        let pv = module("10", false);
        assert_eq!(pv.panel_power_pu(0.0, BaseValues::SBASE), 0.0);
        let mut cold = module("10", false);
        cold.update_conditions(35.0, 280.0);
        assert_eq!(cold.panel_power_pu(0.0, BaseValues::SBASE), 0.0);
    }

    #[test]
    fn panel_power_is_never_negative() {
        let pv = module("10", false);
        // far beyond MPP the diode term dominates and raw power goes negative
        assert_eq!(pv.panel_power_pu(1200.0, BaseValues::SBASE), 0.0);
    }

    #[test]
    fn mpp_converges_near_nominal_voltage_for_rated_module() {
        let pv = module("10", false);
        let solve = pv.mpp_voltage();
        assert!(solve.converged, "residual {}", solve.residual);
        assert!(
            (solve.vdc - 750.0).abs() < 15.0,
            "MPP voltage {} not near 750 V",
            solve.vdc
        );
        assert!(solve.residual.abs() < 1e-6);
    }

    #[test]
    fn mpp_voltage_stays_within_device_bounds_over_fit_range() {
        let mut pv = module("10", false);
        for sinsol in [10.0, 40.0, 70.0, 100.0] {
            pv.update_conditions(sinsol, 298.15);
            let solve = pv.mpp_voltage();
            assert!(solve.converged);
            assert!(solve.vdc > pv.params().vdcmpp_min - 50.0);
            assert!(solve.vdc < pv.params().vdcmpp_max + 50.0);
        }
    }

    #[test]
    fn mpp_power_peaks_at_solved_voltage() {
        let pv = module("10", false);
        let solve = pv.mpp_voltage();
        let p_mpp = pv.panel_power_pu(solve.vdc, BaseValues::SBASE);
        assert!(p_mpp > pv.panel_power_pu(solve.vdc - 20.0, BaseValues::SBASE));
        assert!(p_mpp > pv.panel_power_pu(solve.vdc + 20.0, BaseValues::SBASE));
    }

    #[test]
    fn tiny_iteration_budget_reports_non_convergence() {
        let mut pv = module("10", false);
        pv.solver = MppSolverConfig {
            max_iterations: 1,
            abs_tol: 1e-12,
        };
        pv.update_conditions(10.0, 298.15);
        let solve = pv.mpp_voltage();
        assert!(!solve.converged);
        // and the fit surfaces it as an error
        let err = pv.fit_mpp_polynomial().unwrap_err();
        assert!(matches!(err, DerError::MppNotConverged { .. }));
    }

    #[test]
    fn polynomial_reproduces_exact_mpp_at_fit_samples() {
        let mut pv = module("10", true);
        assert!(pv.mpp_polynomial().is_some());

        let step = (S_MAX - S_MIN) / (MPP_FIT_POINTS as f64 - 1.0);
        for i in 0..MPP_FIT_POINTS {
            let sinsol = S_MIN + step * i as f64;
            pv.update_conditions(sinsol, T_FIT);
            let exact = pv.mpp_voltage();
            assert!(exact.converged);
            let approx = pv
                .mpp_voltage_from_poly(sinsol)
                .expect("polynomial should be fitted");
            // cubic least-squares residual over this grid is small relative
            // to the ~650-800 V range
            assert!(
                (approx - exact.vdc).abs() < 5.0,
                "at S={sinsol}: poly {approx} vs exact {}",
                exact.vdc
            );
        }
    }

    #[test]
    fn fit_restores_operating_conditions() {
        let mut pv = module("10", false);
        pv.update_conditions(42.0, 305.0);
        pv.fit_mpp_polynomial().expect("fit should succeed");
        assert_eq!(pv.sinsol, 42.0);
        assert_eq!(pv.tactual, 305.0);
    }

    #[test]
    fn poly_evaluation_is_none_without_fit() {
        let pv = module("10", false);
        assert_eq!(pv.mpp_voltage_from_poly(50.0), None);
    }
}

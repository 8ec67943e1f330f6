use polars::prelude::*;

use super::{column_names, has_column, normalize_cell};

/// Name of the hosted table the final records are inserted into
pub const COMPANIES_TABLE: &str = "companies";

/// Column order of the `companies` table, excluding its generated `id`
pub const COMPANY_COLUMNS: &[&str] = &[
    "expediente", "ruc", "nombre", "tipo", "pro_codigo", "provincia", "anio",
    "posicion_general", "cia_imvalores", "id_estado_financiero", "ingresos_ventas", "activos",
    "patrimonio", "utilidad_an_imp", "impuesto_renta", "n_empleados", "ingresos_totales",
    "utilidad_ejercicio", "utilidad_neta", "cod_segmento", "ciiu_n1", "ciiu_n6",
    "liquidez_corriente", "prueba_acida", "end_activo", "end_patrimonial", "end_activo_fijo",
    "end_corto_plazo", "end_largo_plazo", "cobertura_interes", "apalancamiento",
    "apalancamiento_financiero", "end_patrimonial_ct", "end_patrimonial_nct",
    "apalancamiento_c_l_plazo", "rot_cartera", "rot_activo_fijo", "rot_ventas",
    "per_med_cobranza", "per_med_pago", "impac_gasto_a_v", "impac_carga_finan",
    "rent_neta_activo", "margen_bruto", "margen_operacional", "rent_neta_ventas",
    "rent_ope_patrimonio", "rent_ope_activo", "roe", "roa", "fortaleza_patrimonial",
    "gastos_financieros", "gastos_admin_ventas", "depreciaciones", "amortizaciones",
    "costos_ventas_prod", "deuda_total", "deuda_total_c_plazo", "total_gastos", "ciiu",
    "descripcion", "id_segmento", "segmento", "nombre_comercial", "canton", "ciudad",
    "actividad_principal", "estado_empresa", "tipo_empresa", "segmento_empresa",
    "fecha_constitucion",
];

/// How a frame's header lines up against a target column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCoverage {
    /// Target columns absent from the frame
    pub missing: Vec<String>,
    /// Frame columns not in the target list
    pub extra: Vec<String>,
    /// Null-equivalent count per present target column, in target order
    pub null_counts: Vec<(String, usize)>,
    /// Header already equals the target list exactly
    pub aligned: bool,
}

/// Compare a frame's columns with a target list and count null-equivalent cells
pub fn schema_coverage(df: &DataFrame, target: &[&str]) -> SchemaCoverage {
    let columns = column_names(df);

    let missing = target
        .iter()
        .filter(|c| !has_column(df, c))
        .map(|c| c.to_string())
        .collect();

    let extra = columns
        .iter()
        .filter(|c| !target.contains(&c.as_str()))
        .cloned()
        .collect();

    let null_counts = target
        .iter()
        .filter_map(|c| {
            let values = df.column(c).ok()?.str().ok()?;
            let nulls = values
                .iter()
                .filter(|v| normalize_cell(*v).is_null())
                .count();
            Some((c.to_string(), nulls))
        })
        .collect();

    SchemaCoverage {
        missing,
        extra,
        null_counts,
        aligned: columns == target,
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

/// Pre-translated report strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLabels {
    pub title: &'static str,
    pub generated_on: &'static str,
    pub statistics_heading: &'static str,
    pub classification_heading: &'static str,
    pub categories_heading: &'static str,
    pub summary_heading: &'static str,
    pub respondents: &'static str,
    pub mean: &'static str,
    pub median: &'static str,
    pub std_dev: &'static str,
    pub min: &'static str,
    pub max: &'static str,
    pub q1: &'static str,
    pub q3: &'static str,
    pub iqr: &'static str,
    pub at_least: &'static str,
    pub band: &'static str,
    pub range: &'static str,
    pub count: &'static str,
    pub share: &'static str,
    pub no_data: &'static str,
    pub summary_unavailable: &'static str,
    pub score_chart: &'static str,
    pub acceptability_chart: &'static str,
    pub histogram_chart: &'static str,
    pub radar_chart: &'static str,
    pub distribution_chart: &'static str,
}

const ENGLISH: ReportLabels = ReportLabels {
    title: "SUS analysis report",
    generated_on: "Generated on",
    statistics_heading: "Statistical summary",
    classification_heading: "Score classification",
    categories_heading: "Scores by category",
    summary_heading: "Analysis",
    respondents: "Responses",
    mean: "Mean SUS score",
    median: "Median",
    std_dev: "Standard deviation",
    min: "Minimum score",
    max: "Maximum score",
    q1: "First quartile (Q1)",
    q3: "Third quartile (Q3)",
    iqr: "IQR",
    at_least: "Responses >=",
    band: "Band",
    range: "Range",
    count: "Count",
    share: "Share",
    no_data: "No responses in this sample.",
    summary_unavailable: "Written analysis unavailable",
    score_chart: "Mean SUS score",
    acceptability_chart: "Acceptability",
    histogram_chart: "Score distribution",
    radar_chart: "Mean answer per question",
    distribution_chart: "Responses per band",
};

const FRENCH: ReportLabels = ReportLabels {
    title: "Rapport d'analyse SUS",
    generated_on: "Généré le",
    statistics_heading: "Résumé statistique",
    classification_heading: "Classes SUS",
    categories_heading: "Scores par catégorie",
    summary_heading: "Analyse",
    respondents: "Nombre de réponses",
    mean: "Score SUS moyen",
    median: "Médiane",
    std_dev: "Écart-type",
    min: "Score minimum",
    max: "Score maximum",
    q1: "1er quartile (Q1)",
    q3: "3e quartile (Q3)",
    iqr: "IQR",
    at_least: "Réponses >=",
    band: "Classe",
    range: "Plage",
    count: "Effectif",
    share: "Part",
    no_data: "Aucune réponse dans cet échantillon.",
    summary_unavailable: "Analyse rédigée indisponible",
    score_chart: "Score SUS moyen",
    acceptability_chart: "Acceptabilité",
    histogram_chart: "Distribution des scores",
    radar_chart: "Réponse moyenne par question",
    distribution_chart: "Réponses par classe",
};

impl Language {
    pub fn labels(self) -> &'static ReportLabels {
        match self {
            Language::En => &ENGLISH,
            Language::Fr => &FRENCH,
        }
    }
}

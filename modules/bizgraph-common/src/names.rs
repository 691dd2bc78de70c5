//! Label, relationship-type and layer names shared by the builders.
//!
//! These must match `config/constraints_schema.json`; the schema document is
//! the source of truth for properties and enums, these are only the handles.

pub mod labels {
    pub const ZIPCODE: &str = "Zipcode";
    pub const CITY: &str = "City";
    pub const NEIGHBORHOOD: &str = "Neighborhood";
    pub const BLOCK_GROUP: &str = "BlockGroup";
    pub const BUSINESS: &str = "Business";

    pub const TOTAL_POPULATION: &str = "TotalPopulation";
    pub const POPULATION_GROWTH: &str = "PopulationGrowth";
    pub const AGE_AVERAGE: &str = "AgeAverage";
    pub const AGE_GROUP: &str = "AgeGroup";
    pub const WEALTH_INDEX: &str = "WealthIndex";
    pub const EDUCATION_LEVEL: &str = "EducationLevel";
    pub const CRIME_INDEX: &str = "CrimeIndex";
    pub const FAST_FOOD_SPENDING_INDEX: &str = "FastFoodSpendingIndex";

    pub const ENRICHMENT: [&str; 8] = [
        TOTAL_POPULATION,
        POPULATION_GROWTH,
        AGE_AVERAGE,
        AGE_GROUP,
        WEALTH_INDEX,
        EDUCATION_LEVEL,
        CRIME_INDEX,
        FAST_FOOD_SPENDING_INDEX,
    ];
}

pub mod rels {
    pub const IS_WITHIN: &str = "IS_WITHIN";
    pub const HAS_NEIGHBOR: &str = "HAS_NEIGHBOR";
    pub const HAS_NEARBY: &str = "HAS_NEARBY";
    pub const HAS_NEIGHBORHOOD: &str = "HAS_NEIGHBORHOOD";
    pub const LOCATED_IN: &str = "LOCATED_IN";
    pub const HAS_ENRICHMENT: &str = "HAS_ENRICHMENT";
}

pub mod layers {
    pub const ZIPCODE: &str = "zipcode_layer";
    pub const BLOCK_GROUP: &str = "block_group_layer";
    pub const BUSINESS: &str = "business_layer";
}

pub mod keys {
    pub const ZIPCODE_NUMBER: &str = "zipcode_number";
    pub const CITY_ID: &str = "city_id";
    pub const CITY_NAME: &str = "city_name";
    pub const NEIGHBORHOOD_ID: &str = "neighborhood_id";
    pub const NEIGHBORHOOD_NAME: &str = "neighborhood_name";
    pub const CT_BLOCK_GROUP: &str = "ct_block_group";
    pub const BUSINESS_ID: &str = "business_id";
    pub const WKT: &str = "wkt";
}

//! Continuous metric → category buckets.

macro_rules! buckets {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

buckets!(
    /// Block-group head count.
    PopulationLevel { Low => "LOW", Medium => "MEDIUM", High => "HIGH" }
);

buckets!(
    GrowthRate {
        Negative => "NEGATIVE",
        Low => "LOW",
        Moderate => "MODERATE",
        High => "HIGH",
        VeryHigh => "VERY_HIGH",
    }
);

buckets!(
    /// Age bands shared by the average-age and age-group categories.
    AgeBand {
        Under5 => "0-4",
        From5To14 => "5-14",
        From15To24 => "15-24",
        From25To44 => "25-44",
        From45To64 => "45-64",
        Over65 => "65+",
    }
);

buckets!(
    WealthCategory {
        Low => "LOW",
        LowerMiddle => "LOWER_MIDDLE",
        Middle => "MIDDLE",
        UpperMiddle => "UPPER_MIDDLE",
        High => "HIGH",
    }
);

buckets!(
    CrimeCategory {
        Safest => "SAFEST",
        Safe => "SAFE",
        Moderate => "MODERATE",
        Unsafe => "UNSAFE",
        MostUnsafe => "MOST_UNSAFE",
    }
);

buckets!(
    SpendingCategory {
        Occasional => "OCCASIONAL",
        LightSpender => "LIGHT_SPENDER",
        Regular => "REGULAR",
        Enthusiast => "ENTHUSIAST",
        SuperFan => "SUPER_FAN",
    }
);

buckets!(
    /// Share of the population in one age band.
    AgeRepresentation {
        VeryLow => "VERY_LOW",
        Low => "LOW",
        Moderate => "MODERATE",
        High => "HIGH",
        Dominant => "DOMINANT",
    }
);

buckets!(
    EducationTier { Basic => "BASIC", Secondary => "SECONDARY", Higher => "HIGHER" }
);

buckets!(
    /// Share of the population at one education tier.
    EducationRepresentation {
        VeryLow => "VERY_LOW",
        Low => "LOW",
        Moderate => "MODERATE",
        High => "HIGH",
        VeryHigh => "VERY_HIGH",
    }
);

impl PopulationLevel {
    pub fn classify(population: f64) -> Self {
        if population < 1000.0 {
            Self::Low
        } else if population <= 2000.0 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl GrowthRate {
    pub fn classify(rate: f64) -> Self {
        if rate < 0.0 {
            Self::Negative
        } else if rate <= 1.0 {
            Self::Low
        } else if rate <= 2.0 {
            Self::Moderate
        } else if rate <= 3.0 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

impl AgeBand {
    pub fn classify(age: f64) -> Self {
        if age < 5.0 {
            Self::Under5
        } else if age < 15.0 {
            Self::From5To14
        } else if age < 25.0 {
            Self::From15To24
        } else if age < 45.0 {
            Self::From25To44
        } else if age < 65.0 {
            Self::From45To64
        } else {
            Self::Over65
        }
    }

    /// Indexes of the 5-year brackets (0-4 … 85+) that make up the band.
    pub fn brackets(&self) -> std::ops::RangeInclusive<usize> {
        match self {
            Self::Under5 => 0..=0,
            Self::From5To14 => 1..=2,
            Self::From15To24 => 3..=4,
            Self::From25To44 => 5..=8,
            Self::From45To64 => 9..=12,
            Self::Over65 => 13..=17,
        }
    }
}

impl WealthCategory {
    /// `normalized` is the min-max scaled wealth index.
    pub fn classify(normalized: f64) -> Self {
        if normalized <= 0.2 {
            Self::Low
        } else if normalized <= 0.4 {
            Self::LowerMiddle
        } else if normalized <= 0.6 {
            Self::Middle
        } else if normalized <= 0.8 {
            Self::UpperMiddle
        } else {
            Self::High
        }
    }
}

impl CrimeCategory {
    pub fn classify(index: f64) -> Self {
        if index < 80.0 {
            Self::Safest
        } else if index <= 119.0 {
            Self::Safe
        } else if index <= 199.0 {
            Self::Moderate
        } else if index <= 499.0 {
            Self::Unsafe
        } else {
            Self::MostUnsafe
        }
    }
}

impl SpendingCategory {
    pub fn classify(normalized: f64) -> Self {
        if normalized <= 0.2 {
            Self::Occasional
        } else if normalized <= 0.4 {
            Self::LightSpender
        } else if normalized <= 0.6 {
            Self::Regular
        } else if normalized <= 0.8 {
            Self::Enthusiast
        } else {
            Self::SuperFan
        }
    }
}

impl AgeRepresentation {
    pub fn classify(share: f64) -> Self {
        if share < 0.05 {
            Self::VeryLow
        } else if share < 0.10 {
            Self::Low
        } else if share < 0.20 {
            Self::Moderate
        } else if share < 0.30 {
            Self::High
        } else {
            Self::Dominant
        }
    }
}

impl EducationRepresentation {
    pub fn classify(share: f64) -> Self {
        if share < 0.05 {
            Self::VeryLow
        } else if share < 0.15 {
            Self::Low
        } else if share < 0.30 {
            Self::Moderate
        } else if share < 0.50 {
            Self::High
        } else {
            Self::VeryHigh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_boundaries() {
        assert_eq!(PopulationLevel::classify(999.0), PopulationLevel::Low);
        assert_eq!(PopulationLevel::classify(1000.0), PopulationLevel::Medium);
        assert_eq!(PopulationLevel::classify(2000.0), PopulationLevel::Medium);
        assert_eq!(PopulationLevel::classify(2001.0), PopulationLevel::High);
    }

    #[test]
    fn growth_boundaries() {
        assert_eq!(GrowthRate::classify(-0.01), GrowthRate::Negative);
        assert_eq!(GrowthRate::classify(0.0), GrowthRate::Low);
        assert_eq!(GrowthRate::classify(1.0), GrowthRate::Low);
        assert_eq!(GrowthRate::classify(1.01), GrowthRate::Moderate);
        assert_eq!(GrowthRate::classify(3.0), GrowthRate::High);
        assert_eq!(GrowthRate::classify(3.5), GrowthRate::VeryHigh);
    }

    #[test]
    fn age_band_upper_bounds_are_exclusive() {
        assert_eq!(AgeBand::classify(4.99), AgeBand::Under5);
        assert_eq!(AgeBand::classify(5.0), AgeBand::From5To14);
        assert_eq!(AgeBand::classify(44.9), AgeBand::From25To44);
        assert_eq!(AgeBand::classify(65.0), AgeBand::Over65);
        assert_eq!(AgeBand::Over65.as_str(), "65+");
    }

    #[test]
    fn age_bands_cover_every_bracket_once() {
        let covered: Vec<usize> = AgeBand::ALL.iter().flat_map(|b| b.brackets()).collect();
        assert_eq!(covered, (0..18).collect::<Vec<_>>());
    }

    #[test]
    fn normalized_buckets_include_upper_bound() {
        assert_eq!(WealthCategory::classify(0.2), WealthCategory::Low);
        assert_eq!(WealthCategory::classify(0.2001), WealthCategory::LowerMiddle);
        assert_eq!(WealthCategory::classify(1.0), WealthCategory::High);
        assert_eq!(SpendingCategory::classify(0.8), SpendingCategory::Enthusiast);
        assert_eq!(SpendingCategory::classify(0.81), SpendingCategory::SuperFan);
    }

    #[test]
    fn crime_boundaries() {
        assert_eq!(CrimeCategory::classify(79.9), CrimeCategory::Safest);
        assert_eq!(CrimeCategory::classify(80.0), CrimeCategory::Safe);
        assert_eq!(CrimeCategory::classify(119.0), CrimeCategory::Safe);
        assert_eq!(CrimeCategory::classify(499.0), CrimeCategory::Unsafe);
        assert_eq!(CrimeCategory::classify(500.0), CrimeCategory::MostUnsafe);
    }

    #[test]
    fn representation_scales_differ() {
        assert_eq!(AgeRepresentation::classify(0.12), AgeRepresentation::Moderate);
        assert_eq!(EducationRepresentation::classify(0.12), EducationRepresentation::Low);
        assert_eq!(AgeRepresentation::classify(0.5), AgeRepresentation::Dominant);
        assert_eq!(EducationRepresentation::classify(0.5), EducationRepresentation::VeryHigh);
    }
}
